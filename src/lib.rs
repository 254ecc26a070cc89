//! Order lifecycle core for a saree e-commerce storefront.
//!
//! This crate is the single authority for order status, payment status,
//! the append-only status-history audit log and the tracking-event log.
//! UI and API layers call [`services::OrderLifecycleService`]; direct
//! writes to order state from outside this crate are a bug.
//!
//! ```no_run
//! use std::sync::Arc;
//! use storefront_orders::{
//!     auth::ActorContext, config::OrdersConfig, db,
//!     services::OrderLifecycleService,
//! };
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Arc::new(OrdersConfig::load()?);
//! let pool = Arc::new(db::establish_connection(&config).await?);
//! let orders = OrderLifecycleService::new(pool, config, None);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod models;
pub mod services;

pub use auth::ActorContext;
pub use errors::ServiceError;
pub use models::{OrderStatus, PaymentStatus, ReturnResolution, ReturnStatus};
pub use services::OrderLifecycleService;
