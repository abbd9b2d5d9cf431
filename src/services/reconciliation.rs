//! Which items are still out on a job, and whether the job may close.
//!
//! An item only carries its current status, so "still out on *this* job" is
//! derived from the ticket history: the item must be `on_job`, its latest
//! delivery to the job must be returnable, and that delivery must be strictly
//! later than its latest receipt from the same job. The timestamp comparison
//! tells "returned from job A, redelivered to job B" apart from "still out on
//! job A".
//!
//! Nothing here writes except [`ReconciliationService::close_job`] and
//! [`ReconciliationService::reopen_job`], which only flip the job status.

use crate::{
    db::DbPool,
    entities::{
        delivery_ticket, delivery_ticket_item, inventory_item, job, receiving_ticket,
        receiving_ticket_item, ItemStatus, JobStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::{load_item_views, ItemView},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A delivery line as seen from one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryMark {
    pub item_id: i64,
    pub at: DateTime<Utc>,
    pub returnable: bool,
}

/// A receiving line as seen from one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptMark {
    pub item_id: i64,
    pub at: DateTime<Utc>,
}

fn is_still_out(
    last_delivery: Option<(DateTime<Utc>, bool)>,
    last_receipt: Option<DateTime<Utc>>,
    on_job: bool,
) -> bool {
    match (on_job, last_delivery) {
        (true, Some((delivered_at, true))) => match last_receipt {
            None => true,
            Some(received_at) => delivered_at > received_at,
        },
        _ => false,
    }
}

/// Still-out set for one job from its delivery and receiving lines and the
/// set of items whose current status is `on_job`.
pub fn derive_still_out(
    deliveries: &[DeliveryMark],
    receipts: &[ReceiptMark],
    on_job: &HashSet<i64>,
) -> BTreeSet<i64> {
    let mut last_delivery: HashMap<i64, (DateTime<Utc>, bool)> = HashMap::new();
    for mark in deliveries {
        let entry = last_delivery
            .entry(mark.item_id)
            .or_insert((mark.at, mark.returnable));
        if (mark.at, mark.returnable) > *entry {
            *entry = (mark.at, mark.returnable);
        }
    }

    let mut last_receipt: HashMap<i64, DateTime<Utc>> = HashMap::new();
    for mark in receipts {
        let entry = last_receipt.entry(mark.item_id).or_insert(mark.at);
        if mark.at > *entry {
            *entry = mark.at;
        }
    }

    last_delivery
        .iter()
        .filter(|(item_id, delivery)| {
            is_still_out(
                Some(**delivery),
                last_receipt.get(item_id).copied(),
                on_job.contains(item_id),
            )
        })
        .map(|(item_id, _)| *item_id)
        .collect()
}

/// What a ticket line did to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Delivered { returnable: bool },
    Received { into: ItemStatus },
}

/// One line of the ticket ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub job_id: i64,
    pub ticket_id: i64,
    pub at: DateTime<Utc>,
    pub item_id: i64,
    pub movement: Movement,
}

impl LedgerEntry {
    fn sort_key(&self) -> (DateTime<Utc>, u8, i64, i64) {
        let kind = match self.movement {
            Movement::Delivered { .. } => 0,
            Movement::Received { .. } => 1,
        };
        (self.at, kind, self.ticket_id, self.item_id)
    }
}

/// Item state rebuilt from nothing but the ticket ledger.
#[derive(Debug, Default, Clone)]
pub struct LedgerReplay {
    statuses: HashMap<i64, ItemStatus>,
    last_delivery: HashMap<(i64, i64), (DateTime<Utc>, bool)>,
    last_receipt: HashMap<(i64, i64), DateTime<Utc>>,
}

impl LedgerReplay {
    /// Applies every entry in timestamp order, starting from an empty yard.
    pub fn replay(entries: impl IntoIterator<Item = LedgerEntry>) -> Self {
        let mut entries: Vec<LedgerEntry> = entries.into_iter().collect();
        entries.sort_by_key(LedgerEntry::sort_key);

        let mut state = Self::default();
        for entry in entries {
            state.apply(entry);
        }
        state
    }

    fn apply(&mut self, entry: LedgerEntry) {
        let key = (entry.job_id, entry.item_id);
        match entry.movement {
            Movement::Delivered { returnable } => {
                let status = if returnable {
                    ItemStatus::OnJob
                } else {
                    ItemStatus::Sold
                };
                self.statuses.insert(entry.item_id, status);
                self.last_delivery.insert(key, (entry.at, returnable));
            }
            Movement::Received { into } => {
                self.statuses.insert(entry.item_id, into);
                self.last_receipt.insert(key, entry.at);
            }
        }
    }

    pub fn status_of(&self, item_id: i64) -> Option<ItemStatus> {
        self.statuses.get(&item_id).copied()
    }

    pub fn still_out(&self, job_id: i64) -> BTreeSet<i64> {
        self.last_delivery
            .iter()
            .filter(|((job, _), _)| *job == job_id)
            .filter(|((job, item_id), delivery)| {
                is_still_out(
                    Some(**delivery),
                    self.last_receipt.get(&(*job, *item_id)).copied(),
                    self.status_of(*item_id) == Some(ItemStatus::OnJob),
                )
            })
            .map(|((_, item_id), _)| *item_id)
            .collect()
    }
}

/// Delivery and receiving lines of one job, each at its own ledger time.
pub(crate) async fn job_marks<C: ConnectionTrait>(
    conn: &C,
    job_id: i64,
) -> Result<(Vec<DeliveryMark>, Vec<ReceiptMark>), ServiceError> {
    let deliveries = delivery_ticket_item::Entity::find()
        .find_also_related(delivery_ticket::Entity)
        .filter(delivery_ticket::Column::JobId.eq(job_id))
        .all(conn)
        .await?
        .into_iter()
        .filter_map(|(line, ticket)| {
            ticket.map(|_| DeliveryMark {
                item_id: line.item_id,
                at: line.delivered_at,
                returnable: line.is_returnable,
            })
        })
        .collect();

    let receipts = receiving_ticket_item::Entity::find()
        .find_also_related(receiving_ticket::Entity)
        .filter(receiving_ticket::Column::JobId.eq(job_id))
        .all(conn)
        .await?
        .into_iter()
        .filter_map(|(line, ticket)| {
            ticket.map(|_| ReceiptMark {
                item_id: line.item_id,
                at: line.received_at,
            })
        })
        .collect();

    Ok((deliveries, receipts))
}

/// Ids of the items still out on `job_id`, read through `conn`.
pub(crate) async fn still_out_ids<C: ConnectionTrait>(
    conn: &C,
    job_id: i64,
) -> Result<BTreeSet<i64>, ServiceError> {
    let (deliveries, receipts) = job_marks(conn, job_id).await?;
    if deliveries.is_empty() {
        return Ok(BTreeSet::new());
    }

    let delivered: BTreeSet<i64> = deliveries.iter().map(|d| d.item_id).collect();
    let on_job: HashSet<i64> = inventory_item::Entity::find()
        .select_only()
        .column(inventory_item::Column::Id)
        .filter(inventory_item::Column::Id.is_in(delivered))
        .filter(inventory_item::Column::Status.eq(ItemStatus::OnJob))
        .into_tuple::<i64>()
        .all(conn)
        .await?
        .into_iter()
        .collect();

    Ok(derive_still_out(&deliveries, &receipts, &on_job))
}

/// The whole ticket ledger, every job.
pub(crate) async fn ledger_entries<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<LedgerEntry>, ServiceError> {
    let mut entries = Vec::new();

    for (line, ticket) in delivery_ticket_item::Entity::find()
        .find_also_related(delivery_ticket::Entity)
        .all(conn)
        .await?
    {
        if let Some(ticket) = ticket {
            entries.push(LedgerEntry {
                job_id: ticket.job_id,
                ticket_id: ticket.id,
                at: line.delivered_at,
                item_id: line.item_id,
                movement: Movement::Delivered {
                    returnable: line.is_returnable,
                },
            });
        }
    }

    for (line, ticket) in receiving_ticket_item::Entity::find()
        .find_also_related(receiving_ticket::Entity)
        .all(conn)
        .await?
    {
        if let Some(ticket) = ticket {
            entries.push(LedgerEntry {
                job_id: ticket.job_id,
                ticket_id: ticket.id,
                at: line.received_at,
                item_id: line.item_id,
                movement: Movement::Received {
                    into: line.received_status,
                },
            });
        }
    }

    Ok(entries)
}

pub(crate) async fn find_job<C: ConnectionTrait>(
    conn: &C,
    job_id: i64,
) -> Result<job::Model, ServiceError> {
    job::Entity::find_by_id(job_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Job {} not found", job_id)))
}

/// Result of asking to close a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobCloseOutcome {
    Closed {
        job_number: String,
    },
    /// Returnable items are still out; the job stays open.
    Refused {
        job_number: String,
        unreturned: Vec<String>,
    },
}

impl JobCloseOutcome {
    pub fn is_closed(&self) -> bool {
        matches!(self, JobCloseOutcome::Closed { .. })
    }

    /// One line suitable for a flash message.
    pub fn message(&self) -> String {
        match self {
            JobCloseOutcome::Closed { job_number } => {
                format!("Job '{}' has been successfully closed.", job_number)
            }
            JobCloseOutcome::Refused {
                job_number,
                unreturned,
            } => format!(
                "Cannot close job '{}'. The following items have not been returned: {}",
                job_number,
                unreturned.join(", ")
            ),
        }
    }
}

#[derive(Clone)]
pub struct ReconciliationService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ReconciliationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Items still out on the job, by serial number.
    #[instrument(skip(self))]
    pub async fn still_out(&self, job_id: i64) -> Result<Vec<ItemView>, ServiceError> {
        let db = self.db_pool.as_ref();
        find_job(db, job_id).await?;
        let ids: Vec<i64> = still_out_ids(db, job_id).await?.into_iter().collect();
        load_item_views(db, Some(ids.as_slice())).await
    }

    /// Items that may go on a receiving ticket for the job.
    #[instrument(skip(self))]
    pub async fn receivable_items(&self, job_id: i64) -> Result<Vec<ItemView>, ServiceError> {
        self.still_out(job_id).await
    }

    /// Still-out set rebuilt by replaying the full ticket ledger.
    #[instrument(skip(self))]
    pub async fn replay_still_out(&self, job_id: i64) -> Result<BTreeSet<i64>, ServiceError> {
        let db = self.db_pool.as_ref();
        find_job(db, job_id).await?;
        let entries = ledger_entries(db).await?;
        Ok(LedgerReplay::replay(entries).still_out(job_id))
    }

    #[instrument(skip(self))]
    pub async fn can_close(&self, job_id: i64) -> Result<bool, ServiceError> {
        let db = self.db_pool.as_ref();
        find_job(db, job_id).await?;
        Ok(still_out_ids(db, job_id).await?.is_empty())
    }

    /// Closes the job when nothing returnable is still out on it.
    #[instrument(skip(self))]
    pub async fn close_job(&self, job_id: i64) -> Result<JobCloseOutcome, ServiceError> {
        let db = self.db_pool.as_ref();

        let outcome = db
            .transaction::<_, JobCloseOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    let job = job::Entity::find_by_id(job_id)
                        .lock_exclusive()
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound(format!("Job {} not found", job_id)))?;

                    let out: Vec<i64> = still_out_ids(txn, job_id).await?.into_iter().collect();
                    if !out.is_empty() {
                        let unreturned = load_item_views(txn, Some(out.as_slice()))
                            .await?
                            .into_iter()
                            .map(|i| i.serial_number)
                            .collect();
                        return Ok(JobCloseOutcome::Refused {
                            job_number: job.job_number,
                            unreturned,
                        });
                    }

                    let job_number = job.job_number.clone();
                    if job.status != JobStatus::Closed {
                        let mut active: job::ActiveModel = job.into();
                        active.status = Set(JobStatus::Closed);
                        active.update(txn).await?;
                    }
                    Ok(JobCloseOutcome::Closed { job_number })
                })
            })
            .await?;

        match &outcome {
            JobCloseOutcome::Closed { job_number } => {
                info!(%job_number, "Job closed");
                self.event_sender
                    .send_or_log(Event::JobClosed {
                        job_id,
                        job_number: job_number.clone(),
                    })
                    .await;
            }
            JobCloseOutcome::Refused {
                job_number,
                unreturned,
            } => {
                warn!(%job_number, unreturned = unreturned.len(), "Job close refused");
                self.event_sender
                    .send_or_log(Event::JobCloseRefused {
                        job_id,
                        job_number: job_number.clone(),
                        unreturned: unreturned.clone(),
                    })
                    .await;
            }
        }

        Ok(outcome)
    }

    /// Reopens a job. Always succeeds for an existing job.
    #[instrument(skip(self))]
    pub async fn reopen_job(&self, job_id: i64) -> Result<job::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let job = find_job(db, job_id).await?;

        let job = if job.status == JobStatus::Open {
            job
        } else {
            let mut active: job::ActiveModel = job.into();
            active.status = Set(JobStatus::Open);
            active.update(db).await?
        };

        info!(job_number = %job.job_number, "Job reopened");
        self.event_sender
            .send_or_log(Event::JobReopened {
                job_id,
                job_number: job.job_number.clone(),
            })
            .await;
        Ok(job)
    }
}
