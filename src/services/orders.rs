//! The order lifecycle service: the sole authority for mutating order
//! status, payment status, tracking data and the append-only audit
//! logs. Every multi-row write runs inside one transaction and
//! re-reads current state before validating, so history and current
//! status never diverge and stale reads cannot slip a bad transition
//! through.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::ActorContext,
    config::OrdersConfig,
    db::DbPool,
    entities::{
        order::{self, ActiveModel as OrderActiveModel},
        order_item, product, return_item,
        return_request::{self, ActiveModel as ReturnRequestActiveModel},
        status_history, tracking_event,
    },
    errors::{ensure_non_negative, ServiceError},
    events::{Event, EventSender},
    models::{
        generate_order_number, OrderStatus, PaymentStatus, ReturnResolution, ReturnStatus,
    },
};

/// Allowed drift between the supplied total and the recomputed one,
/// covering currency rounding only.
const TOTAL_TOLERANCE: Decimal = dec!(0.01);

/// Shipping address snapshot taken at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddressInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub size: Option<String>,
    pub colour: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate]
    pub items: Vec<OrderItemInput>,
    pub shipping: Decimal,
    pub tax: Decimal,
    /// Total as shown to the customer at checkout; must agree with the
    /// recomputed `subtotal + shipping + tax` within rounding
    /// tolerance.
    pub total: Decimal,
    #[validate]
    pub shipping_address: Option<AddressInput>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub payment_status: Option<PaymentStatus>,
    #[validate(length(min = 1, max = 100, message = "Tracking number must be 1-100 characters"))]
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddTrackingEventRequest {
    /// Carrier-style label, e.g. "Shipped", "Out for Delivery".
    #[validate(length(min = 1, max = 100, message = "Tracking status must be 1-100 characters"))]
    pub status: String,
    pub description: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReturnItemInput {
    pub order_item_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RequestReturnRequest {
    #[validate]
    pub items: Vec<ReturnItemInput>,
    pub resolution: ReturnResolution,
    pub reason: Option<String>,
}

/// An order with its lines and both append-only logs: history in
/// chronological order, tracking events newest first (the display
/// convention).
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub history: Vec<status_history::Model>,
    pub tracking_events: Vec<tracking_event::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnRequestView {
    pub request: return_request::Model,
    pub items: Vec<return_item::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderListView {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service owning the order lifecycle. Holds no mutable state between
/// calls; cloning shares the pool and configuration.
#[derive(Clone)]
pub struct OrderLifecycleService {
    db: Arc<DbPool>,
    config: Arc<OrdersConfig>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderLifecycleService {
    pub fn new(
        db: Arc<DbPool>,
        config: Arc<OrdersConfig>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            config,
            event_sender,
        }
    }

    /// Creates an order at checkout: decrements stock (all-or-nothing,
    /// guarded against concurrent buyers), snapshots prices and the
    /// shipping address, and writes the initial Pending history entry,
    /// all in one transaction.
    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn create_order(
        &self,
        actor: &ActorContext,
        request: CreateOrderRequest,
    ) -> Result<OrderDetails, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }
        ensure_non_negative("shipping", request.shipping)?;
        ensure_non_negative("tax", request.tax)?;
        ensure_non_negative("total", request.total)?;

        let shipping_address = match &request.shipping_address {
            Some(address) => Some(serde_json::to_string(address).map_err(|e| {
                ServiceError::ValidationError(format!("Invalid shipping address: {e}"))
            })?),
            None => None,
        };

        let order_id = Uuid::new_v4();
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "failed to begin order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        // Price each line from the catalogue and take stock inside the
        // transaction. The decrement is conditional on stock >=
        // quantity so two buyers racing for the last unit cannot both
        // succeed.
        let mut subtotal = Decimal::ZERO;
        let mut lines = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let found = product::Entity::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;
            if !found.is_active {
                return Err(ServiceError::ValidationError(format!(
                    "Product {} is not available",
                    found.name
                )));
            }

            let updated = product::Entity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(item.quantity),
                )
                .filter(product::Column::Id.eq(item.product_id))
                .filter(product::Column::Stock.gte(item.quantity))
                .exec(&txn)
                .await?;
            if updated.rows_affected == 0 {
                return Err(ServiceError::InsufficientStock {
                    product_id: found.id,
                    name: found.name,
                    requested: item.quantity,
                    available: found.stock,
                });
            }

            subtotal += found.price * Decimal::from(item.quantity);
            lines.push((item, found));
        }

        let computed_total = subtotal + request.shipping + request.tax;
        if (computed_total - request.total).abs() > TOTAL_TOLERANCE {
            return Err(ServiceError::ValidationError(format!(
                "Total mismatch: supplied {}, computed {}",
                request.total, computed_total
            )));
        }

        let order_model = OrderActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            user_id: Set(actor.user_id),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            payment_method: Set(request.payment_method.clone()),
            subtotal: Set(subtotal),
            shipping: Set(request.shipping),
            tax: Set(request.tax),
            total: Set(request.total),
            tracking_number: Set(None),
            notes: Set(request.notes.clone()),
            shipping_address: Set(shipping_address),
            version: Set(1),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for (input, found) in &lines {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(found.id),
                product_name: Set(found.name.clone()),
                quantity: Set(input.quantity),
                unit_price: Set(found.price),
                size: Set(input.size.clone()),
                colour: Set(input.colour.clone()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        self.append_history(&txn, order_id, OrderStatus::Pending, Some("Order placed"))
            .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, order_number = %order_model.order_number, "order created");
        self.publish(Event::OrderCreated {
            order_id,
            user_id: actor.user_id,
        })
        .await;

        self.load_details(&*self.db, order_model).await
    }

    /// Moves an order along the lifecycle. Admin-only. The transition
    /// is checked against the freshly re-read status inside the
    /// transaction; the matching history row is written atomically with
    /// the order update. Re-applying the current status is accepted and
    /// still audited.
    #[instrument(skip(self, request), fields(order_id = %order_id, new_status = %request.status))]
    pub async fn update_status(
        &self,
        actor: &ActorContext,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderDetails, ServiceError> {
        actor.require_admin("update_status")?;
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to begin status update transaction");
            ServiceError::DatabaseError(e)
        })?;

        let current = self.find_order(&txn, order_id).await?;
        let old_status = current.status;
        let old_payment = current.payment_status;
        let version = current.version;

        if !old_status.can_transition_to(request.status) {
            warn!(order_id = %order_id, from = %old_status, to = %request.status, "rejected status transition");
            return Err(ServiceError::InvalidTransition {
                from: old_status,
                to: request.status,
            });
        }

        let mut active: OrderActiveModel = current.into();
        active.status = Set(request.status);
        if let Some(payment_status) = request.payment_status {
            active.payment_status = Set(payment_status);
        }
        if let Some(tracking_number) = request.tracking_number.clone() {
            active.tracking_number = Set(Some(tracking_number));
        }
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        self.append_history(&txn, order_id, request.status, request.notes.as_deref())
            .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to commit status update");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, from = %old_status, to = %request.status, "order status updated");
        self.publish(Event::OrderStatusChanged {
            order_id,
            old_status,
            new_status: request.status,
        })
        .await;
        if let Some(new_payment) = request.payment_status {
            if new_payment != old_payment {
                self.publish(Event::PaymentStatusChanged {
                    order_id,
                    old_status: old_payment,
                    new_status: new_payment,
                })
                .await;
            }
        }

        self.load_details(&*self.db, updated).await
    }

    /// Appends a carrier milestone to the tracking log. Admin-only.
    /// Tracking labels are a separate vocabulary and never touch the
    /// order's own status.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn add_tracking_event(
        &self,
        actor: &ActorContext,
        order_id: Uuid,
        request: AddTrackingEventRequest,
    ) -> Result<OrderDetails, ServiceError> {
        actor.require_admin("add_tracking_event")?;
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let order = self.find_order(&*self.db, order_id).await?;

        tracking_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            status: Set(request.status.clone()),
            description: Set(request.description.clone()),
            location: Set(request.location.clone()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(order_id = %order_id, status = %request.status, "tracking event appended");
        self.publish(Event::TrackingEventAdded {
            order_id,
            status: request.status,
        })
        .await;

        self.load_details(&*self.db, order).await
    }

    /// Cancels an order. Owner-or-admin, and only while the order is
    /// still Pending or Processing; once shipped the parcel is with the
    /// carrier and cancellation is rejected. Restocks every line,
    /// appends the Cancelled history row and a synthetic tracking event
    /// carrying the reason, all in one transaction. Payment status is
    /// left untouched; refunds are the payment workflow's concern.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(
        &self,
        actor: &ActorContext,
        order_id: Uuid,
        reason: String,
    ) -> Result<OrderDetails, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to begin cancellation transaction");
            ServiceError::DatabaseError(e)
        })?;

        let current = self.find_order(&txn, order_id).await?;
        actor.require_owner_or_admin(current.user_id, "cancel_order")?;

        if !current.status.can_cancel() {
            warn!(order_id = %order_id, status = %current.status, "rejected cancellation");
            return Err(ServiceError::InvalidTransition {
                from: current.status,
                to: OrderStatus::Cancelled,
            });
        }
        let old_status = current.status;
        let version = current.version;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        for item in &items {
            product::Entity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).add(item.quantity),
                )
                .filter(product::Column::Id.eq(item.product_id))
                .exec(&txn)
                .await?;
        }

        let mut active: OrderActiveModel = current.into();
        active.status = Set(OrderStatus::Cancelled);
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        self.append_history(&txn, order_id, OrderStatus::Cancelled, Some(reason.as_str()))
            .await?;

        tracking_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            status: Set("Cancelled".to_string()),
            description: Set(Some(format!("Order cancelled: {reason}"))),
            location: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to commit cancellation");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, from = %old_status, restocked_lines = items.len(), "order cancelled");
        self.publish(Event::OrderCancelled { order_id, reason }).await;

        self.load_details(&*self.db, updated).await
    }

    /// Records a return request for a delivered order within the
    /// configured return window. Owner-or-admin. The order's status is
    /// not mutated; approval and refund are a follow-on workflow.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn request_return(
        &self,
        actor: &ActorContext,
        order_id: Uuid,
        request: RequestReturnRequest,
    ) -> Result<ReturnRequestView, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Return request must name at least one item".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to begin return request transaction");
            ServiceError::DatabaseError(e)
        })?;

        let order = self.find_order(&txn, order_id).await?;
        actor.require_owner_or_admin(order.user_id, "request_return")?;

        if order.status != OrderStatus::Delivered {
            return Err(ServiceError::InvalidState(format!(
                "Returns require a delivered order; order {} is {}",
                order.order_number, order.status
            )));
        }

        let delivered_at = status_history::Entity::find()
            .filter(status_history::Column::OrderId.eq(order_id))
            .filter(status_history::Column::Status.eq(OrderStatus::Delivered))
            .order_by_desc(status_history::Column::CreatedAt)
            .one(&txn)
            .await?
            .map(|entry| entry.created_at)
            .unwrap_or_else(|| order.updated_at.unwrap_or(order.created_at));

        if Utc::now() - delivered_at > self.config.return_window() {
            return Err(ServiceError::ReturnWindowExpired {
                order_id,
                delivered_at,
                window_days: self.config.return_window_days,
            });
        }

        let order_items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        for input in &request.items {
            let line = order_items
                .iter()
                .find(|item| item.id == input.order_item_id)
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Order item {} does not belong to order {}",
                        input.order_item_id, order.order_number
                    ))
                })?;
            if input.quantity > line.quantity {
                return Err(ServiceError::ValidationError(format!(
                    "Cannot return {} of {}; only {} were ordered",
                    input.quantity, line.product_name, line.quantity
                )));
            }
        }

        let request_id = Uuid::new_v4();
        let saved = ReturnRequestActiveModel {
            id: Set(request_id),
            order_id: Set(order_id),
            user_id: Set(order.user_id),
            status: Set(ReturnStatus::Requested),
            resolution: Set(request.resolution),
            reason: Set(request.reason.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut saved_items = Vec::with_capacity(request.items.len());
        for input in &request.items {
            let line = order_items
                .iter()
                .find(|item| item.id == input.order_item_id)
                .expect("validated above");
            let item = return_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                return_request_id: Set(request_id),
                order_item_id: Set(input.order_item_id),
                product_id: Set(line.product_id),
                quantity: Set(input.quantity),
                reason: Set(input.reason.clone()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            saved_items.push(item);
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to commit return request");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, return_request_id = %request_id, "return requested");
        self.publish(Event::ReturnRequested {
            order_id,
            return_request_id: request_id,
        })
        .await;

        Ok(ReturnRequestView {
            request: saved,
            items: saved_items,
        })
    }

    /// Fetches an order with items, history and tracking events.
    /// Owner-or-admin.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        actor: &ActorContext,
        order_id: Uuid,
    ) -> Result<OrderDetails, ServiceError> {
        let order = self.find_order(&*self.db, order_id).await?;
        actor.require_owner_or_admin(order.user_id, "get_order")?;
        self.load_details(&*self.db, order).await
    }

    /// Lists a user's orders newest first, paginated (1-based pages).
    #[instrument(skip(self))]
    pub async fn list_orders_for_user(
        &self,
        actor: &ActorContext,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListView, ServiceError> {
        actor.require_owner_or_admin(user_id, "list_orders_for_user")?;
        if page == 0 || per_page == 0 {
            return Err(ServiceError::ValidationError(
                "page and per_page are 1-based and must be positive".to_string(),
            ));
        }

        let paginator = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok(OrderListView {
            orders,
            total,
            page,
            per_page,
        })
    }

    async fn find_order<C: ConnectionTrait>(
        &self,
        db: &C,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn append_history<C: ConnectionTrait>(
        &self,
        db: &C,
        order_id: Uuid,
        status: OrderStatus,
        notes: Option<&str>,
    ) -> Result<(), ServiceError> {
        status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            status: Set(status),
            notes: Set(notes.map(str::to_string)),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Ok(())
    }

    async fn load_details<C: ConnectionTrait>(
        &self,
        db: &C,
        order: order::Model,
    ) -> Result<OrderDetails, ServiceError> {
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(db)
            .await?;
        let history = status_history::Entity::find()
            .filter(status_history::Column::OrderId.eq(order.id))
            .order_by_asc(status_history::Column::CreatedAt)
            .all(db)
            .await?;
        let tracking_events = tracking_event::Entity::find()
            .filter(tracking_event::Column::OrderId.eq(order.id))
            .order_by_desc(tracking_event::Column::CreatedAt)
            .all(db)
            .await?;

        Ok(OrderDetails {
            order,
            items,
            history,
            tracking_events,
        })
    }

    async fn publish(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to publish event");
            }
        }
    }
}
