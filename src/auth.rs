//! Caller identity, passed explicitly into every lifecycle operation.
//!
//! Authentication happens upstream (session middleware, JWT, whatever
//! the embedding application uses); the lifecycle service only needs to
//! know who is acting and whether they hold the admin role, and never
//! reads ambient session state.

use uuid::Uuid;

use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl ActorContext {
    pub fn customer(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    /// Back-office operations: status updates and tracking events.
    pub fn require_admin(&self, operation: &str) -> Result<(), ServiceError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "{} requires the admin role",
                operation
            )))
        }
    }

    /// Customer-facing operations on someone's own order: the owner or
    /// an admin may act, nobody else.
    pub fn require_owner_or_admin(
        &self,
        owner_id: Uuid,
        operation: &str,
    ) -> Result<(), ServiceError> {
        if self.is_admin || self.user_id == owner_id {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "{} is only allowed for the order owner",
                operation
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn admin_passes_both_checks() {
        let actor = ActorContext::admin(Uuid::new_v4());
        assert!(actor.require_admin("update status").is_ok());
        assert!(actor
            .require_owner_or_admin(Uuid::new_v4(), "cancel order")
            .is_ok());
    }

    #[test]
    fn customer_may_only_touch_their_own_orders() {
        let user_id = Uuid::new_v4();
        let actor = ActorContext::customer(user_id);
        assert!(actor.require_owner_or_admin(user_id, "cancel order").is_ok());
        assert_matches!(
            actor.require_owner_or_admin(Uuid::new_v4(), "cancel order"),
            Err(ServiceError::Forbidden(_))
        );
        assert_matches!(
            actor.require_admin("update status"),
            Err(ServiceError::Forbidden(_))
        );
    }
}
