//! Test harness: lifecycle service over an in-memory SQLite database
//! with the schema built straight from the entities.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DbBackend, EntityTrait, QueryFilter, Schema, Set,
};
use storefront_orders::{
    auth::ActorContext,
    config::OrdersConfig,
    entities::{
        order, order_item, product, return_item, return_request, status_history, tracking_event,
    },
    events::{Event, EventSender},
    models::OrderStatus,
    services::{
        CreateOrderRequest, OrderDetails, OrderItemInput, OrderLifecycleService,
        UpdateOrderStatusRequest,
    },
};
use uuid::Uuid;

pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<OrdersConfig>,
    pub service: OrderLifecycleService,
    pub event_rx: tokio::sync::mpsc::Receiver<Event>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_return_window(7).await
    }

    /// Fresh in-memory database per test. A single connection keeps
    /// every handle on the same memory database.
    pub async fn with_return_window(days: i64) -> Self {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).min_connections(1);
        let db = Database::connect(options)
            .await
            .expect("failed to open in-memory sqlite");

        let schema = Schema::new(DbBackend::Sqlite);
        let statements = [
            schema.create_table_from_entity(product::Entity),
            schema.create_table_from_entity(order::Entity),
            schema.create_table_from_entity(order_item::Entity),
            schema.create_table_from_entity(status_history::Entity),
            schema.create_table_from_entity(tracking_event::Entity),
            schema.create_table_from_entity(return_request::Entity),
            schema.create_table_from_entity(return_item::Entity),
        ];
        for statement in statements {
            db.execute(db.get_database_backend().build(&statement))
                .await
                .expect("failed to create table");
        }

        let db = Arc::new(db);
        let mut config = OrdersConfig::for_database("sqlite::memory:");
        config.return_window_days = days;
        let config = Arc::new(config);
        let (event_sender, event_rx) = EventSender::channel(64);
        let service =
            OrderLifecycleService::new(db.clone(), config.clone(), Some(Arc::new(event_sender)));

        Self {
            db,
            config,
            service,
            event_rx,
        }
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            sku: Set(format!("SKU-{}", Uuid::new_v4().simple())),
            price: Set(price),
            stock: Set(stock),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed product")
    }

    pub async fn product_stock(&self, product_id: Uuid) -> i32 {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await
            .expect("stock query failed")
            .expect("product missing")
            .stock
    }

    /// Places an order for a single product with free shipping and no
    /// tax, supplying the correct total.
    pub async fn place_order(
        &self,
        actor: &ActorContext,
        product: &product::Model,
        quantity: i32,
    ) -> OrderDetails {
        self.service
            .create_order(actor, simple_order_request(product, quantity))
            .await
            .expect("order creation failed")
    }

    /// Walks an order through the given statuses as an admin.
    pub async fn advance(
        &self,
        admin: &ActorContext,
        order_id: Uuid,
        statuses: &[OrderStatus],
    ) -> OrderDetails {
        let mut details = None;
        for status in statuses {
            details = Some(
                self.service
                    .update_status(
                        admin,
                        order_id,
                        UpdateOrderStatusRequest {
                            status: *status,
                            payment_status: None,
                            tracking_number: None,
                            notes: None,
                        },
                    )
                    .await
                    .unwrap_or_else(|e| panic!("transition to {status} failed: {e}")),
            );
        }
        details.expect("advance called with no statuses")
    }

    /// Rewrites the newest Delivered history entry to `days_ago`, to
    /// simulate an order delivered in the past.
    pub async fn backdate_delivery(&self, order_id: Uuid, days_ago: i64) {
        let entry = status_history::Entity::find()
            .filter(status_history::Column::OrderId.eq(order_id))
            .filter(status_history::Column::Status.eq(OrderStatus::Delivered))
            .one(&*self.db)
            .await
            .expect("history query failed")
            .expect("no delivered history entry");

        let mut active: status_history::ActiveModel = entry.into();
        active.created_at = Set(Utc::now() - Duration::days(days_ago));
        active
            .update(&*self.db)
            .await
            .expect("failed to backdate delivery");
    }
}

pub fn simple_order_request(product: &product::Model, quantity: i32) -> CreateOrderRequest {
    CreateOrderRequest {
        items: vec![OrderItemInput {
            product_id: product.id,
            quantity,
            size: None,
            colour: None,
        }],
        shipping: Decimal::ZERO,
        tax: Decimal::ZERO,
        total: product.price * Decimal::from(quantity),
        shipping_address: None,
        payment_method: Some("upi".to_string()),
        notes: None,
    }
}

pub fn admin() -> ActorContext {
    ActorContext::admin(Uuid::new_v4())
}

pub fn customer() -> ActorContext {
    ActorContext::customer(Uuid::new_v4())
}
