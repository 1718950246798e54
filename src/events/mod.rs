use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Domain events emitted after a transaction commits. Delivery is best
/// effort: a committed ledger change is never failed because a consumer
/// went away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    SaleCompleted {
        sale_id: Uuid,
        company_id: Uuid,
        item_count: usize,
    },
    StockReceived {
        stock_lot_id: Uuid,
        product_variant_id: Uuid,
        quantity: i32,
    },
    InventoryAdjusted {
        stock_lot_id: Uuid,
        log_id: Uuid,
        previous_quantity: i32,
        new_quantity: i32,
    },
    InventoryLogReverted {
        log_id: Uuid,
        stock_lot_id: Uuid,
        restored_quantity: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}
