use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::OrderStatus;

/// Error type returned by every order lifecycle operation.
///
/// Business-rule violations are distinct variants so callers can render
/// specific user-facing messages ("cannot cancel a shipped order" vs.
/// "item out of stock"). Persistence failures are wrapped into
/// `DatabaseError` at the service boundary and are not retried here;
/// retry policy belongs to the calling layer.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        name: String,
        requested: i32,
        available: i32,
    },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Return window expired for order {order_id}: delivered {delivered_at}, window {window_days} days")]
    ReturnWindowExpired {
        order_id: Uuid,
        delivered_at: DateTime<Utc>,
        window_days: i64,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl ServiceError {
    /// Stable machine-readable code, for callers that map errors onto
    /// API responses without matching on variants.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::DatabaseError(_) => "database_error",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::ValidationError(_) => "validation_error",
            ServiceError::InsufficientStock { .. } => "insufficient_stock",
            ServiceError::InvalidTransition { .. } => "invalid_transition",
            ServiceError::InvalidState(_) => "invalid_state",
            ServiceError::ReturnWindowExpired { .. } => "return_window_expired",
            ServiceError::Forbidden(_) => "forbidden",
        }
    }

    /// Whether the failure is worth retrying as-is. Only persistence
    /// failures qualify; everything else needs different input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::DatabaseError(_))
    }
}

/// Serializable error body in the shape the storefront's API layer
/// returns to clients.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl From<&ServiceError> for ErrorBody {
    fn from(err: &ServiceError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Convenience for validating money fields before they reach an entity.
pub(crate) fn ensure_non_negative(field: &str, value: Decimal) -> Result<(), ServiceError> {
    if value.is_sign_negative() {
        return Err(ServiceError::ValidationError(format!(
            "{} must not be negative, got {}",
            field, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn insufficient_stock_names_the_product() {
        let err = ServiceError::InsufficientStock {
            product_id: Uuid::new_v4(),
            name: "Kanchipuram Silk Saree".to_string(),
            requested: 3,
            available: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("Kanchipuram Silk Saree"));
        assert!(msg.contains("requested 3"));
        assert!(msg.contains("available 1"));
        assert_eq!(err.code(), "insufficient_stock");
    }

    #[test]
    fn invalid_transition_names_both_statuses() {
        let err = ServiceError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
        };
        let msg = err.to_string();
        assert!(msg.contains("Pending"));
        assert!(msg.contains("Delivered"));
    }

    #[test]
    fn only_database_errors_are_retryable() {
        assert!(ServiceError::DatabaseError(DbErr::Custom("conn reset".into())).is_retryable());
        assert!(!ServiceError::NotFound("order".into()).is_retryable());
    }

    #[test]
    fn negative_money_is_rejected() {
        assert!(ensure_non_negative("subtotal", dec!(-0.01)).is_err());
        assert!(ensure_non_negative("subtotal", dec!(0)).is_ok());
    }
}
