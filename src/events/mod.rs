use crate::entities::{ItemStatus, TicketKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{info, warn};

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

    /// Sends an event after a commit. The write already happened, so a closed
    /// channel is only worth a warning.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropping domain event");
        }
    }
}

/// Domain events emitted after the owning transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    DeliveryTicketCreated {
        job_id: i64,
        ticket_id: i64,
        ticket_number: String,
        item_count: usize,
        sold_count: usize,
    },
    ReceivingTicketCreated {
        job_id: i64,
        ticket_id: i64,
        ticket_number: String,
        item_count: usize,
        /// Items per status they were received into.
        by_status: BTreeMap<ItemStatus, usize>,
    },
    TicketEdited {
        kind: TicketKind,
        ticket_id: i64,
        added: usize,
        removed: usize,
    },
    ItemsStatusChanged {
        item_ids: Vec<i64>,
        status: ItemStatus,
    },
    JobCreated {
        job_id: i64,
        job_number: String,
    },
    JobClosed {
        job_id: i64,
        job_number: String,
    },
    JobCloseRefused {
        job_id: i64,
        job_number: String,
        unreturned: Vec<String>,
    },
    JobReopened {
        job_id: i64,
        job_number: String,
    },
    InventoryImported {
        created: usize,
        updated: usize,
        skipped: usize,
    },
}

// Drains the channel and records each event. Runs until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::DeliveryTicketCreated {
                job_id,
                ticket_number,
                item_count,
                sold_count,
                ..
            } => {
                info!(job_id, %ticket_number, item_count, sold_count, "Delivery ticket created");
            }
            Event::ReceivingTicketCreated {
                job_id,
                ticket_number,
                item_count,
                by_status,
                ..
            } => {
                info!(job_id, %ticket_number, item_count, ?by_status, "Receiving ticket created");
            }
            Event::TicketEdited {
                kind,
                ticket_id,
                added,
                removed,
            } => {
                info!(%kind, ticket_id, added, removed, "Ticket edited");
            }
            Event::ItemsStatusChanged { item_ids, status } => {
                info!(item_count = item_ids.len(), %status, "Item statuses changed");
            }
            Event::JobCreated { job_number, .. } => {
                info!(%job_number, "Job created");
            }
            Event::JobClosed { job_number, .. } => {
                info!(%job_number, "Job closed");
            }
            Event::JobCloseRefused {
                job_number,
                unreturned,
                ..
            } => {
                warn!(%job_number, unreturned = ?unreturned, "Job close refused");
            }
            Event::JobReopened { job_number, .. } => {
                info!(%job_number, "Job reopened");
            }
            Event::InventoryImported {
                created,
                updated,
                skipped,
            } => {
                info!(created, updated, skipped, "Inventory imported");
            }
        }
    }

    warn!("Event processing loop has ended");
}
