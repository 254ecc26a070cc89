//! Domain events emitted by the lifecycle service after a successful
//! commit. Delivery is best-effort: a full or closed channel is logged
//! and ignored, it never fails the operation that produced the event.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{OrderStatus, PaymentStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        user_id: Uuid,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    PaymentStatusChanged {
        order_id: Uuid,
        old_status: PaymentStatus,
        new_status: PaymentStatus,
    },
    OrderCancelled {
        order_id: Uuid,
        reason: String,
    },
    TrackingEventAdded {
        order_id: Uuid,
        status: String,
    },
    ReturnRequested {
        order_id: Uuid,
        return_request_id: Uuid,
    },
}

/// Cloneable handle for publishing [`Event`]s to whatever the embedding
/// application wires up (notification fan-out, webhook outbox, ...).
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Builds a sender together with the receiving half, mostly for
    /// tests and simple embeddings.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}
