//! Delivery and receiving tickets.
//!
//! A ticket and the status changes it causes are written in one transaction.
//! Item rows are locked before anything is checked, and the ledger timestamp
//! is taken after the locks so two tickets touching the same item are always
//! ordered by their commit order. Every line carries its own ledger time:
//! lines written by an edit are stamped when the edit commits, kept lines
//! keep theirs.

use crate::{
    db::DbPool,
    entities::{
        customer, delivery_ticket, delivery_ticket_item, inventory_item, product_category,
        receiving_ticket, receiving_ticket_item, ItemStatus, TicketKind, YardLocation,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        inventory::{canonical_serial, load_item_views, lock_items, transition_items, ItemView},
        numbering::{next_identifier, SequenceScope},
        reconciliation::{find_job, still_out_ids},
    },
};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const DEFAULT_SEARCH_LIMIT: u64 = 20;

const NOTHING_TO_DELIVER: &str = "You must select at least one item to deliver.";
const NOTHING_TO_RECEIVE: &str = "You must select at least one item to receive.";
const NO_LONGER_AVAILABLE: &str =
    "Some selected items are no longer available. Please reload and try again.";

/// One item on a delivery request. `returnable == false` sells the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DeliveryLine {
    pub item_id: i64,
    pub returnable: bool,
}

impl DeliveryLine {
    pub fn returnable(item_id: i64) -> Self {
        Self {
            item_id,
            returnable: true,
        }
    }

    pub fn sold(item_id: i64) -> Self {
        Self {
            item_id,
            returnable: false,
        }
    }
}

/// One item on a receiving request and the status it comes back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReceivingLine {
    pub item_id: i64,
    pub target_status: ItemStatus,
}

impl ReceivingLine {
    pub fn new(item_id: i64, target_status: ItemStatus) -> Self {
        Self {
            item_id,
            target_status,
        }
    }

    pub fn available(item_id: i64) -> Self {
        Self::new(item_id, ItemStatus::Available)
    }
}

/// Which pool of items smart search looks in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Items in the yard with status `available`.
    Available,
    /// Items still out on the job.
    OnJob,
}

/// Items of one category on a printed ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub unit: Option<String>,
    pub count: usize,
    pub serials: Vec<String>,
}

/// Read-only projection a ticket document is rendered from.
#[derive(Debug, Clone, Serialize)]
pub struct TicketDocument {
    pub kind: TicketKind,
    pub ticket_id: i64,
    pub ticket_number: String,
    pub ticket_date: DateTime<Utc>,
    /// Who delivered or received the items; "N/A" when unknown.
    pub created_by: String,
    pub job_number: String,
    pub customer_name: String,
    pub rig: String,
    pub well: String,
    pub location: String,
    /// Grouped by category name, in name order.
    pub groups: Vec<CategoryGroup>,
    pub total_items: usize,
}

/// Splits newline-separated serials into canonical, de-duplicated form,
/// keeping the first-seen order.
pub fn parse_serial_list(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(canonical_serial)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Groups item views by category for a ticket document.
pub fn group_by_category(items: Vec<ItemView>) -> Vec<CategoryGroup> {
    let mut groups: BTreeMap<String, CategoryGroup> = BTreeMap::new();
    for item in items {
        let group = groups
            .entry(item.category.clone())
            .or_insert_with(|| CategoryGroup {
                category: item.category.clone(),
                unit: item.unit.clone(),
                count: 0,
                serials: Vec::new(),
            });
        group.count += 1;
        group.serials.push(item.serial_number);
    }
    groups
        .into_values()
        .map(|mut g| {
            g.serials.sort();
            g
        })
        .collect()
}

/// A ledger timestamp for a new ticket or edited line: now, truncated to
/// microseconds, and strictly after every ticket and line already recorded.
async fn next_ticket_timestamp<C: ConnectionTrait>(conn: &C) -> Result<DateTime<Utc>, ServiceError> {
    let latest_delivery = delivery_ticket::Entity::find()
        .order_by_desc(delivery_ticket::Column::TicketDate)
        .one(conn)
        .await?
        .map(|t| t.ticket_date);
    let latest_receipt = receiving_ticket::Entity::find()
        .order_by_desc(receiving_ticket::Column::TicketDate)
        .one(conn)
        .await?
        .map(|t| t.ticket_date);
    let latest_delivery_line = delivery_ticket_item::Entity::find()
        .order_by_desc(delivery_ticket_item::Column::DeliveredAt)
        .one(conn)
        .await?
        .map(|l| l.delivered_at);
    let latest_receipt_line = receiving_ticket_item::Entity::find()
        .order_by_desc(receiving_ticket_item::Column::ReceivedAt)
        .one(conn)
        .await?
        .map(|l| l.received_at);

    let latest = [
        latest_delivery,
        latest_receipt,
        latest_delivery_line,
        latest_receipt_line,
    ]
    .into_iter()
    .flatten()
    .max();

    let now = Utc::now().trunc_subsecs(6);
    Ok(match latest {
        Some(latest) if latest >= now => latest + Duration::microseconds(1),
        _ => now,
    })
}

fn dedupe_delivery(lines: &[DeliveryLine]) -> BTreeMap<i64, bool> {
    lines.iter().map(|l| (l.item_id, l.returnable)).collect()
}

fn dedupe_receiving(lines: &[ReceivingLine]) -> BTreeMap<i64, ItemStatus> {
    lines.iter().map(|l| (l.item_id, l.target_status)).collect()
}

/// Item count per status a receiving ticket sends items into.
fn received_counts(wanted: &BTreeMap<i64, ItemStatus>) -> BTreeMap<ItemStatus, usize> {
    let mut counts = BTreeMap::new();
    for status in wanted.values() {
        *counts.entry(*status).or_insert(0) += 1;
    }
    counts
}

/// Whether an item's status still comes from a delivery line on `out`'s job:
/// a returnable line whose item is still out there, or a sold line whose item
/// is still sold. Only then may an edit undo or flip the line.
fn reflects_delivery(item: &inventory_item::Model, returnable: bool, out: &BTreeSet<i64>) -> bool {
    if returnable {
        out.contains(&item.id)
    } else {
        item.status == ItemStatus::Sold
    }
}

fn delivery_status(returnable: bool) -> ItemStatus {
    if returnable {
        ItemStatus::OnJob
    } else {
        ItemStatus::Sold
    }
}

/// Applies `target(item)` to each item, one statement per distinct target.
async fn transition_grouped<C, F>(
    conn: &C,
    items: Vec<inventory_item::Model>,
    target: F,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
    F: Fn(&inventory_item::Model) -> ItemStatus,
{
    let mut by_status: HashMap<ItemStatus, Vec<inventory_item::Model>> = HashMap::new();
    for item in items {
        by_status.entry(target(&item)).or_default().push(item);
    }
    for (status, items) in by_status {
        transition_items(conn, &items, status, None).await?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct TicketService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    search_limit: u64,
}

impl TicketService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_search_limit(mut self, limit: u64) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    /// Sends available items out on a job.
    ///
    /// Every selected item must still be `available` once locked, or nothing
    /// is written. Returnable lines put the item `on_job`, others mark it
    /// `sold`.
    #[instrument(skip(self))]
    pub async fn create_delivery_ticket(
        &self,
        job_id: i64,
        lines: Vec<DeliveryLine>,
        created_by: Option<String>,
    ) -> Result<delivery_ticket::Model, ServiceError> {
        let wanted = dedupe_delivery(&lines);
        if wanted.is_empty() {
            return Err(ServiceError::InvalidOperation(NOTHING_TO_DELIVER.to_string()));
        }

        let db = self.db_pool.as_ref();
        let (ticket, sold_count, item_count) = db
            .transaction::<_, (delivery_ticket::Model, usize, usize), ServiceError>(move |txn| {
                Box::pin(async move {
                    find_job(txn, job_id).await?;

                    let ids: Vec<i64> = wanted.keys().copied().collect();
                    let items = lock_items(txn, &ids, Some(ItemStatus::Available)).await?;
                    if items.len() != ids.len() {
                        return Err(ServiceError::InvalidOperation(
                            NO_LONGER_AVAILABLE.to_string(),
                        ));
                    }

                    let ticket_number = next_identifier(
                        txn,
                        SequenceScope::Ticket {
                            kind: TicketKind::Delivery,
                            job_id,
                        },
                    )
                    .await?;
                    let ticket_date = next_ticket_timestamp(txn).await?;

                    let ticket = delivery_ticket::ActiveModel {
                        job_id: Set(job_id),
                        ticket_number: Set(ticket_number),
                        ticket_date: Set(ticket_date),
                        created_by: Set(created_by),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    delivery_ticket_item::Entity::insert_many(wanted.iter().map(
                        |(item_id, returnable)| delivery_ticket_item::ActiveModel {
                            ticket_id: Set(ticket.id),
                            item_id: Set(*item_id),
                            is_returnable: Set(*returnable),
                            delivered_at: Set(ticket_date),
                            ..Default::default()
                        },
                    ))
                    .exec_without_returning(txn)
                    .await?;

                    let sold_count = wanted.values().filter(|r| !**r).count();
                    let item_count = items.len();
                    transition_grouped(txn, items, |item| {
                        delivery_status(wanted.get(&item.id).copied().unwrap_or(true))
                    })
                    .await?;

                    Ok((ticket, sold_count, item_count))
                })
            })
            .await?;

        info!(
            job_id,
            ticket_number = %ticket.ticket_number,
            item_count,
            sold_count,
            "Delivery ticket created"
        );
        self.event_sender
            .send_or_log(Event::DeliveryTicketCreated {
                job_id,
                ticket_id: ticket.id,
                ticket_number: ticket.ticket_number.clone(),
                item_count,
                sold_count,
            })
            .await;

        Ok(ticket)
    }

    /// Takes items back from a job, each into its requested status.
    ///
    /// No status precondition is enforced here; callers pick from
    /// [`receivable_items`](crate::services::reconciliation::ReconciliationService::receivable_items).
    #[instrument(skip(self))]
    pub async fn create_receiving_ticket(
        &self,
        job_id: i64,
        lines: Vec<ReceivingLine>,
        created_by: Option<String>,
    ) -> Result<receiving_ticket::Model, ServiceError> {
        let wanted = dedupe_receiving(&lines);
        if wanted.is_empty() {
            return Err(ServiceError::InvalidOperation(NOTHING_TO_RECEIVE.to_string()));
        }
        let by_status = received_counts(&wanted);

        let db = self.db_pool.as_ref();
        let (ticket, item_count) = db
            .transaction::<_, (receiving_ticket::Model, usize), ServiceError>(move |txn| {
                Box::pin(async move {
                    find_job(txn, job_id).await?;

                    let ids: Vec<i64> = wanted.keys().copied().collect();
                    let items = lock_items(txn, &ids, None).await?;
                    if items.len() != ids.len() {
                        return Err(ServiceError::NotFound(format!(
                            "{} of {} selected items do not exist",
                            ids.len() - items.len(),
                            ids.len()
                        )));
                    }

                    let ticket_number = next_identifier(
                        txn,
                        SequenceScope::Ticket {
                            kind: TicketKind::Receiving,
                            job_id,
                        },
                    )
                    .await?;
                    let ticket_date = next_ticket_timestamp(txn).await?;

                    let ticket = receiving_ticket::ActiveModel {
                        job_id: Set(job_id),
                        ticket_number: Set(ticket_number),
                        ticket_date: Set(ticket_date),
                        created_by: Set(created_by),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    receiving_ticket_item::Entity::insert_many(wanted.iter().map(
                        |(item_id, status)| receiving_ticket_item::ActiveModel {
                            ticket_id: Set(ticket.id),
                            item_id: Set(*item_id),
                            received_status: Set(*status),
                            received_at: Set(ticket_date),
                            ..Default::default()
                        },
                    ))
                    .exec_without_returning(txn)
                    .await?;

                    let item_count = items.len();
                    transition_grouped(txn, items, |item| {
                        wanted
                            .get(&item.id)
                            .copied()
                            .unwrap_or(ItemStatus::Available)
                    })
                    .await?;

                    Ok((ticket, item_count))
                })
            })
            .await?;

        info!(
            job_id,
            ticket_number = %ticket.ticket_number,
            item_count,
            "Receiving ticket created"
        );
        self.event_sender
            .send_or_log(Event::ReceivingTicketCreated {
                job_id,
                ticket_id: ticket.id,
                ticket_number: ticket.ticket_number.clone(),
                item_count,
                by_status,
            })
            .await;

        Ok(ticket)
    }

    /// Replaces a delivery ticket's lines.
    ///
    /// Dropped items go back to `available`. New items must be `available`.
    /// Kept items whose returnable flag changed move to `on_job` or `sold`.
    /// Dropping or flipping a line is refused once its item has moved on, for
    /// example been received back; the later tickets have to be edited first.
    /// New and flipped lines are stamped with a fresh ledger time.
    #[instrument(skip(self))]
    pub async fn edit_delivery_ticket(
        &self,
        ticket_id: i64,
        lines: Vec<DeliveryLine>,
    ) -> Result<delivery_ticket::Model, ServiceError> {
        let wanted = dedupe_delivery(&lines);
        if wanted.is_empty() {
            return Err(ServiceError::InvalidOperation(NOTHING_TO_DELIVER.to_string()));
        }

        let db = self.db_pool.as_ref();
        let (ticket, added, removed) = db
            .transaction::<_, (delivery_ticket::Model, usize, usize), ServiceError>(move |txn| {
                Box::pin(async move {
                    let ticket = delivery_ticket::Entity::find_by_id(ticket_id)
                        .lock_exclusive()
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Delivery ticket {} not found", ticket_id))
                        })?;

                    let current: BTreeMap<i64, delivery_ticket_item::Model> =
                        delivery_ticket_item::Entity::find()
                            .filter(delivery_ticket_item::Column::TicketId.eq(ticket_id))
                            .all(txn)
                            .await?
                            .into_iter()
                            .map(|l| (l.item_id, l))
                            .collect();

                    let removed: Vec<i64> = current
                        .keys()
                        .filter(|id| !wanted.contains_key(*id))
                        .copied()
                        .collect();
                    let added: Vec<i64> = wanted
                        .keys()
                        .filter(|id| !current.contains_key(*id))
                        .copied()
                        .collect();
                    let flipped: Vec<i64> = wanted
                        .iter()
                        .filter(|(id, returnable)| {
                            current
                                .get(*id)
                                .map_or(false, |line| line.is_returnable != **returnable)
                        })
                        .map(|(id, _)| *id)
                        .collect();

                    let added_items = lock_items(txn, &added, Some(ItemStatus::Available)).await?;
                    if added_items.len() != added.len() {
                        return Err(ServiceError::InvalidOperation(
                            NO_LONGER_AVAILABLE.to_string(),
                        ));
                    }
                    let removed_items = lock_items(txn, &removed, None).await?;
                    let flipped_items = lock_items(txn, &flipped, None).await?;

                    let out = still_out_ids(txn, ticket.job_id).await?;
                    let moved: Vec<String> = removed_items
                        .iter()
                        .chain(flipped_items.iter())
                        .filter(|item| {
                            current
                                .get(&item.id)
                                .map_or(false, |line| !reflects_delivery(item, line.is_returnable, &out))
                        })
                        .map(|item| item.serial_number.clone())
                        .collect();
                    if !moved.is_empty() {
                        return Err(ServiceError::InvalidOperation(format!(
                            "{} moved since ticket {}. Edit the later tickets first.",
                            moved.join(", "),
                            ticket.ticket_number
                        )));
                    }

                    let stamped_at = next_ticket_timestamp(txn).await?;

                    transition_items(txn, &removed_items, ItemStatus::Available, None).await?;
                    let target = |item: &inventory_item::Model| {
                        delivery_status(wanted.get(&item.id).copied().unwrap_or(true))
                    };
                    transition_grouped(txn, added_items, target).await?;
                    transition_grouped(txn, flipped_items, target).await?;

                    delivery_ticket_item::Entity::delete_many()
                        .filter(delivery_ticket_item::Column::TicketId.eq(ticket_id))
                        .exec(txn)
                        .await?;
                    delivery_ticket_item::Entity::insert_many(wanted.iter().map(
                        |(item_id, returnable)| {
                            let delivered_at = match current.get(item_id) {
                                Some(line) if line.is_returnable == *returnable => line.delivered_at,
                                _ => stamped_at,
                            };
                            delivery_ticket_item::ActiveModel {
                                ticket_id: Set(ticket_id),
                                item_id: Set(*item_id),
                                is_returnable: Set(*returnable),
                                delivered_at: Set(delivered_at),
                                ..Default::default()
                            }
                        },
                    ))
                    .exec_without_returning(txn)
                    .await?;

                    Ok((ticket, added.len(), removed.len()))
                })
            })
            .await?;

        info!(
            ticket_number = %ticket.ticket_number,
            added,
            removed,
            "Delivery ticket edited"
        );
        self.event_sender
            .send_or_log(Event::TicketEdited {
                kind: TicketKind::Delivery,
                ticket_id,
                added,
                removed,
            })
            .await;

        Ok(ticket)
    }

    /// Replaces a receiving ticket's item set.
    ///
    /// Dropped items go back to `on_job`, undoing the receipt. New items take
    /// their requested status and a fresh ledger time; kept items keep the
    /// status and time they were received with.
    #[instrument(skip(self))]
    pub async fn edit_receiving_ticket(
        &self,
        ticket_id: i64,
        lines: Vec<ReceivingLine>,
    ) -> Result<receiving_ticket::Model, ServiceError> {
        let wanted = dedupe_receiving(&lines);
        if wanted.is_empty() {
            return Err(ServiceError::InvalidOperation(NOTHING_TO_RECEIVE.to_string()));
        }

        let db = self.db_pool.as_ref();
        let (ticket, added, removed) = db
            .transaction::<_, (receiving_ticket::Model, usize, usize), ServiceError>(move |txn| {
                Box::pin(async move {
                    let ticket = receiving_ticket::Entity::find_by_id(ticket_id)
                        .lock_exclusive()
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Receiving ticket {} not found",
                                ticket_id
                            ))
                        })?;

                    let current: BTreeMap<i64, receiving_ticket_item::Model> =
                        receiving_ticket_item::Entity::find()
                            .filter(receiving_ticket_item::Column::TicketId.eq(ticket_id))
                            .all(txn)
                            .await?
                            .into_iter()
                            .map(|l| (l.item_id, l))
                            .collect();

                    let removed: Vec<i64> = current
                        .keys()
                        .filter(|id| !wanted.contains_key(*id))
                        .copied()
                        .collect();
                    let added: Vec<i64> = wanted
                        .keys()
                        .filter(|id| !current.contains_key(*id))
                        .copied()
                        .collect();

                    let added_items = lock_items(txn, &added, None).await?;
                    if added_items.len() != added.len() {
                        return Err(ServiceError::NotFound(
                            "Some selected items do not exist".to_string(),
                        ));
                    }
                    let removed_items = lock_items(txn, &removed, None).await?;
                    let stamped_at = next_ticket_timestamp(txn).await?;

                    transition_items(txn, &removed_items, ItemStatus::OnJob, None).await?;
                    transition_grouped(txn, added_items, |item| {
                        wanted
                            .get(&item.id)
                            .copied()
                            .unwrap_or(ItemStatus::Available)
                    })
                    .await?;

                    let recorded: BTreeMap<i64, (ItemStatus, DateTime<Utc>)> = wanted
                        .iter()
                        .map(|(id, target)| {
                            let kept = current
                                .get(id)
                                .map(|line| (line.received_status, line.received_at));
                            (*id, kept.unwrap_or((*target, stamped_at)))
                        })
                        .collect();

                    receiving_ticket_item::Entity::delete_many()
                        .filter(receiving_ticket_item::Column::TicketId.eq(ticket_id))
                        .exec(txn)
                        .await?;
                    receiving_ticket_item::Entity::insert_many(recorded.iter().map(
                        |(item_id, (status, received_at))| receiving_ticket_item::ActiveModel {
                            ticket_id: Set(ticket_id),
                            item_id: Set(*item_id),
                            received_status: Set(*status),
                            received_at: Set(*received_at),
                            ..Default::default()
                        },
                    ))
                    .exec_without_returning(txn)
                    .await?;

                    Ok((ticket, added.len(), removed.len()))
                })
            })
            .await?;

        info!(
            ticket_number = %ticket.ticket_number,
            added,
            removed,
            "Receiving ticket edited"
        );
        self.event_sender
            .send_or_log(Event::TicketEdited {
                kind: TicketKind::Receiving,
                ticket_id,
                added,
                removed,
            })
            .await;

        Ok(ticket)
    }

    /// Delivery from pasted serial numbers, one per line. All lines are
    /// returnable. Any unknown or unavailable serial rejects the whole batch.
    #[instrument(skip(self, serial_text))]
    pub async fn quick_delivery(
        &self,
        job_id: i64,
        serial_text: &str,
        created_by: Option<String>,
    ) -> Result<delivery_ticket::Model, ServiceError> {
        let serials = parse_serial_list(serial_text);
        if serials.is_empty() {
            return Err(ServiceError::InvalidInput(
                "No serial numbers provided.".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();
        find_job(db, job_id).await?;
        let found = self.items_by_serial(&serials).await?;

        let mut problems = Vec::new();
        let mut lines = Vec::with_capacity(serials.len());
        for serial in &serials {
            match found.get(serial) {
                None => problems.push(format!("{}: not found", serial)),
                Some(item) if item.status != ItemStatus::Available => problems.push(format!(
                    "{}: not available (status {})",
                    serial, item.status
                )),
                Some(item) => lines.push(DeliveryLine::returnable(item.id)),
            }
        }

        if !problems.is_empty() {
            warn!(job_id, rejected = problems.len(), "Quick delivery rejected");
            return Err(ServiceError::InvalidInput(format!(
                "Cannot create delivery ticket: {}",
                problems.join("; ")
            )));
        }

        self.create_delivery_ticket(job_id, lines, created_by).await
    }

    /// Resolves pasted serials to items still out on the job, ready for a
    /// receiving ticket. Any serial that is unknown or not out on this job
    /// rejects the whole batch.
    #[instrument(skip(self, serial_text))]
    pub async fn quick_receive(
        &self,
        job_id: i64,
        serial_text: &str,
    ) -> Result<Vec<i64>, ServiceError> {
        let serials = parse_serial_list(serial_text);
        if serials.is_empty() {
            return Err(ServiceError::InvalidInput(
                "No serial numbers provided.".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();
        let job = find_job(db, job_id).await?;
        let out = still_out_ids(db, job_id).await?;
        let found = self.items_by_serial(&serials).await?;

        let mut problems = Vec::new();
        let mut candidates = Vec::with_capacity(serials.len());
        for serial in &serials {
            match found.get(serial) {
                None => problems.push(format!("{}: not found", serial)),
                Some(item) if !out.contains(&item.id) => {
                    problems.push(format!("{}: not out on job {}", serial, job.job_number))
                }
                Some(item) => candidates.push(item.id),
            }
        }

        if !problems.is_empty() {
            warn!(job_id, rejected = problems.len(), "Quick receive rejected");
            return Err(ServiceError::InvalidInput(format!(
                "Cannot receive items: {}",
                problems.join("; ")
            )));
        }

        Ok(candidates)
    }

    async fn items_by_serial(
        &self,
        serials: &[String],
    ) -> Result<HashMap<String, inventory_item::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        Ok(inventory_item::Entity::find()
            .filter(inventory_item::Column::SerialNumber.is_in(serials.iter().cloned()))
            .all(db)
            .await?
            .into_iter()
            .map(|i| (i.serial_number.clone(), i))
            .collect())
    }

    /// The data behind a printed delivery or receiving ticket.
    #[instrument(skip(self))]
    pub async fn ticket_document(
        &self,
        kind: TicketKind,
        ticket_id: i64,
    ) -> Result<TicketDocument, ServiceError> {
        let db = self.db_pool.as_ref();

        let (job_id, ticket_number, ticket_date, created_by, item_ids) = match kind {
            TicketKind::Delivery => {
                let ticket = delivery_ticket::Entity::find_by_id(ticket_id)
                    .one(db)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Delivery ticket {} not found", ticket_id))
                    })?;
                let ids: Vec<i64> = delivery_ticket_item::Entity::find()
                    .filter(delivery_ticket_item::Column::TicketId.eq(ticket_id))
                    .all(db)
                    .await?
                    .into_iter()
                    .map(|l| l.item_id)
                    .collect();
                (ticket.job_id, ticket.ticket_number, ticket.ticket_date, ticket.created_by, ids)
            }
            TicketKind::Receiving => {
                let ticket = receiving_ticket::Entity::find_by_id(ticket_id)
                    .one(db)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Receiving ticket {} not found", ticket_id))
                    })?;
                let ids: Vec<i64> = receiving_ticket_item::Entity::find()
                    .filter(receiving_ticket_item::Column::TicketId.eq(ticket_id))
                    .all(db)
                    .await?
                    .into_iter()
                    .map(|l| l.item_id)
                    .collect();
                (ticket.job_id, ticket.ticket_number, ticket.ticket_date, ticket.created_by, ids)
            }
        };

        let job = find_job(db, job_id).await?;
        let customer_name = customer::Entity::find_by_id(job.customer_id)
            .one(db)
            .await?
            .map(|c| c.name)
            .unwrap_or_default();

        let groups = group_by_category(load_item_views(db, Some(item_ids.as_slice())).await?);
        let total_items = groups.iter().map(|g| g.count).sum();

        Ok(TicketDocument {
            kind,
            ticket_id,
            ticket_number,
            ticket_date,
            created_by: created_by.unwrap_or_else(|| "N/A".to_string()),
            job_number: job.job_number,
            customer_name,
            rig: job.rig,
            well: job.well,
            location: job.location,
            groups,
            total_items,
        })
    }

    /// Type-ahead search by serial number for the ticket forms.
    #[instrument(skip(self))]
    pub async fn smart_search(
        &self,
        job_id: i64,
        query: &str,
        mode: SearchMode,
    ) -> Result<Vec<ItemView>, ServiceError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let db = self.db_pool.as_ref();
        let pool: Vec<(inventory_item::Model, Option<product_category::Model>)> = match mode {
            SearchMode::Available => {
                inventory_item::Entity::find()
                    .find_also_related(product_category::Entity)
                    .filter(inventory_item::Column::Status.eq(ItemStatus::Available))
                    .order_by_asc(inventory_item::Column::SerialNumber)
                    .all(db)
                    .await?
            }
            SearchMode::OnJob => {
                find_job(db, job_id).await?;
                let out: BTreeSet<i64> = still_out_ids(db, job_id).await?;
                if out.is_empty() {
                    return Ok(Vec::new());
                }
                inventory_item::Entity::find()
                    .find_also_related(product_category::Entity)
                    .filter(inventory_item::Column::Id.is_in(out))
                    .order_by_asc(inventory_item::Column::SerialNumber)
                    .all(db)
                    .await?
            }
        };

        let limit = usize::try_from(self.search_limit).unwrap_or(usize::MAX);
        Ok(pool
            .into_iter()
            .filter(|(item, _)| item.serial_number.to_lowercase().contains(&needle))
            .take(limit)
            .map(ItemView::from)
            .collect())
    }

    /// Items that may go on a delivery from the given yard.
    #[instrument(skip(self))]
    pub async fn available_items_at(
        &self,
        location: YardLocation,
    ) -> Result<Vec<ItemView>, ServiceError> {
        let db = self.db_pool.as_ref();
        Ok(inventory_item::Entity::find()
            .find_also_related(product_category::Entity)
            .filter(inventory_item::Column::Status.eq(ItemStatus::Available))
            .filter(inventory_item::Column::Location.eq(location))
            .order_by_asc(inventory_item::Column::SerialNumber)
            .all(db)
            .await?
            .into_iter()
            .map(ItemView::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(serial: &str, category: &str) -> ItemView {
        ItemView {
            id: 0,
            serial_number: serial.to_string(),
            category_id: 0,
            category: category.to_string(),
            unit: Some("joint".to_string()),
            location: YardLocation::MaadiYard,
            location_label: "Maadi Yard".to_string(),
            status: ItemStatus::OnJob,
            status_note: None,
        }
    }

    #[test]
    fn serial_lists_are_canonical_and_unique() {
        let serials = parse_serial_list(" pipe-001\n\nPIPE-001\r\ncollar-7 \n");
        assert_eq!(serials, vec!["PIPE-001", "COLLAR-7"]);
    }

    #[test]
    fn documents_group_by_category_in_name_order() {
        let groups = group_by_category(vec![
            view("T-2", "Tubing"),
            view("DP-9", "Drill Pipe"),
            view("T-1", "Tubing"),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].category, "Drill Pipe");
        assert_eq!(groups[1].count, 2);
        assert_eq!(groups[1].serials, vec!["T-1", "T-2"]);
        assert_eq!(groups[1].unit.as_deref(), Some("joint"));
    }

    #[test]
    fn receipts_count_items_per_target_status() {
        let wanted = dedupe_receiving(&[
            ReceivingLine::available(1),
            ReceivingLine::new(2, ItemStatus::ReCut),
            ReceivingLine::available(3),
            ReceivingLine::new(3, ItemStatus::PendingInspection),
        ]);
        assert_eq!(
            received_counts(&wanted),
            BTreeMap::from([
                (ItemStatus::Available, 1),
                (ItemStatus::ReCut, 1),
                (ItemStatus::PendingInspection, 1),
            ])
        );
    }

    #[test]
    fn later_lines_win_when_an_item_repeats() {
        let lines = [DeliveryLine::returnable(4), DeliveryLine::sold(4)];
        assert_eq!(dedupe_delivery(&lines), BTreeMap::from([(4, false)]));
    }
}
