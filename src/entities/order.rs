use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{OrderStatus, PaymentStatus};

/// An order. `status` and `payment_status` are only ever written by the
/// lifecycle service, together with a matching `status_history` row in
/// the same transaction, so the current status always equals the newest
/// history entry.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    #[validate(length(
        min = 1,
        max = 50,
        message = "Order number must be between 1 and 50 characters"
    ))]
    pub order_number: String,

    pub user_id: Uuid,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,

    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    /// Always `subtotal + shipping + tax` (validated to rounding
    /// tolerance at creation).
    pub total: Decimal,

    pub tracking_number: Option<String>,
    pub notes: Option<String>,

    /// JSON snapshot of the shipping address as it was at order time,
    /// not a live reference to the customer's address book.
    pub shipping_address: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,

    /// Optimistic-lock counter, bumped on every mutation.
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_many = "super::status_history::Entity")]
    StatusHistory,
    #[sea_orm(has_many = "super::tracking_event::Entity")]
    TrackingEvent,
    #[sea_orm(has_many = "super::return_request::Entity")]
    ReturnRequest,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl Related<super::tracking_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrackingEvent.def()
    }
}

impl Related<super::return_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReturnRequest.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr> {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(Some(now));
        Ok(active_model)
    }
}
