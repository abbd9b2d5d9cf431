//! Sequential, human-readable identifiers.
//!
//! Job numbers are `{job type}-{NNN}` with one sequence per job type; delivery
//! and receiving tickets are `DT-{NNN}` / `RT-{NNN}` with one sequence per job.
//! Each sequence lives in an `id_sequences` row that is locked and bumped in
//! the same transaction that inserts the numbered record, so two concurrent
//! creations cannot hand out the same number.

use crate::{
    entities::{
        delivery_ticket, id_sequence, job, receiving_ticket, JobType, TicketKind,
    },
    errors::ServiceError,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use tracing::{debug, warn};

/// Minimum number of digits in the numeric suffix.
pub const SEQUENCE_WIDTH: usize = 3;

/// A numbering scope: which records share one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceScope {
    Job(JobType),
    Ticket { kind: TicketKind, job_id: i64 },
}

impl SequenceScope {
    fn scope(&self) -> &'static str {
        match self {
            SequenceScope::Job(_) => "job",
            SequenceScope::Ticket {
                kind: TicketKind::Delivery,
                ..
            } => "delivery",
            SequenceScope::Ticket {
                kind: TicketKind::Receiving,
                ..
            } => "receiving",
        }
    }

    fn scope_key(&self) -> String {
        match self {
            SequenceScope::Job(job_type) => job_type.code().to_string(),
            SequenceScope::Ticket { job_id, .. } => job_id.to_string(),
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            SequenceScope::Job(job_type) => job_type.code(),
            SequenceScope::Ticket { kind, .. } => kind.prefix(),
        }
    }
}

/// Joins a prefix and a counter, zero-padding the counter.
pub fn format_id(prefix: &str, n: i32) -> String {
    format!("{}-{:0width$}", prefix, n, width = SEQUENCE_WIDTH)
}

/// Numeric suffix after the last `-`, if there is one.
pub fn parse_suffix(id: &str) -> Option<i32> {
    let (_, suffix) = id.rsplit_once('-')?;
    suffix.trim().parse::<i32>().ok().filter(|n| *n >= 0)
}

/// The counter that follows `last`. No previous identifier, or one whose
/// suffix cannot be parsed, restarts the sequence at 1.
pub fn next_after(last: Option<&str>) -> i32 {
    match last.map(|id| (id, parse_suffix(id))) {
        Some((_, Some(n))) => n.saturating_add(1),
        Some((id, None)) => {
            warn!(last_identifier = %id, "Unparsable identifier suffix, restarting sequence at 1");
            1
        }
        None => 1,
    }
}

/// Most recently inserted identifier in a scope, by insertion order.
async fn latest_existing<C: ConnectionTrait>(
    conn: &C,
    scope: &SequenceScope,
) -> Result<Option<String>, ServiceError> {
    let latest = match scope {
        SequenceScope::Job(job_type) => job::Entity::find()
            .filter(job::Column::JobType.eq(*job_type))
            .order_by_desc(job::Column::Id)
            .one(conn)
            .await?
            .map(|j| j.job_number),
        SequenceScope::Ticket {
            kind: TicketKind::Delivery,
            job_id,
        } => delivery_ticket::Entity::find()
            .filter(delivery_ticket::Column::JobId.eq(*job_id))
            .order_by_desc(delivery_ticket::Column::Id)
            .one(conn)
            .await?
            .map(|t| t.ticket_number),
        SequenceScope::Ticket {
            kind: TicketKind::Receiving,
            job_id,
        } => receiving_ticket::Entity::find()
            .filter(receiving_ticket::Column::JobId.eq(*job_id))
            .order_by_desc(receiving_ticket::Column::Id)
            .one(conn)
            .await?
            .map(|t| t.ticket_number),
    };
    Ok(latest)
}

/// Reserves the next identifier in `scope`.
///
/// Must be called on the transaction that inserts the numbered record. The
/// counter row is taken `FOR UPDATE`; a scope seen for the first time is
/// seeded from the latest existing record so older data keeps its numbering.
pub async fn next_identifier<C: ConnectionTrait>(
    conn: &C,
    scope: SequenceScope,
) -> Result<String, ServiceError> {
    let scope_name = scope.scope();
    let scope_key = scope.scope_key();

    let existing = id_sequence::Entity::find()
        .filter(id_sequence::Column::Scope.eq(scope_name))
        .filter(id_sequence::Column::ScopeKey.eq(scope_key.as_str()))
        .lock_exclusive()
        .one(conn)
        .await?;

    let value = match existing {
        Some(row) => {
            let value = row.last_value.saturating_add(1);
            let mut active: id_sequence::ActiveModel = row.into();
            active.last_value = Set(value);
            active.update(conn).await?;
            value
        }
        None => {
            let latest = latest_existing(conn, &scope).await?;
            let value = next_after(latest.as_deref());
            id_sequence::ActiveModel {
                scope: Set(scope_name.to_string()),
                scope_key: Set(scope_key.clone()),
                last_value: Set(value),
                ..Default::default()
            }
            .insert(conn)
            .await?;
            value
        }
    };

    let identifier = format_id(scope.prefix(), value);
    debug!(scope = scope_name, %scope_key, %identifier, "Reserved identifier");
    Ok(identifier)
}
