//! Database entities for the yard inventory core.
//!
//! Each module follows the sea-orm layout: a `Model`, its `Relation` enum and
//! the `ActiveModelBehavior` hook. Domain enums persisted as strings live next to
//! the entity that owns them.

pub mod contract;
pub mod contract_category;
pub mod customer;
pub mod delivery_ticket;
pub mod delivery_ticket_item;
pub mod id_sequence;
pub mod inventory_item;
pub mod job;
pub mod product_category;
pub mod receiving_ticket;
pub mod receiving_ticket_item;

pub use inventory_item::{ItemStatus, YardLocation};
pub use job::{JobStatus, JobType};

use serde::{Deserialize, Serialize};

/// The two ledgers a ticket can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TicketKind {
    Delivery,
    Receiving,
}

impl TicketKind {
    /// Prefix of the per-job ticket number.
    pub fn prefix(&self) -> &'static str {
        match self {
            TicketKind::Delivery => "DT",
            TicketKind::Receiving => "RT",
        }
    }
}
