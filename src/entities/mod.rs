//! SeaORM entities backing the order lifecycle core.
//!
//! `status_history` and `tracking_event` are append-only: rows are only
//! ever inserted, never updated or deleted.

pub mod order;
pub mod order_item;
pub mod product;
pub mod return_item;
pub mod return_request;
pub mod status_history;
pub mod tracking_event;
