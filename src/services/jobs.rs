use crate::{
    db::DbPool,
    entities::{
        contract, contract_category, customer, delivery_ticket, delivery_ticket_item,
        inventory_item, job, product_category, receiving_ticket, receiving_ticket_item,
        ItemStatus, JobStatus, JobType, TicketKind,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        inventory::{load_item_views, ItemView},
        numbering::{next_identifier, SequenceScope},
        reconciliation::{find_job, still_out_ids},
    },
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Fields a user fills in to open a job. The number is assigned on insert.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewJob {
    pub job_type: JobType,
    pub customer_id: i64,
    #[validate(length(min = 1, max = 100))]
    pub rig: String,
    #[validate(length(min = 1, max = 200))]
    pub location: String,
    #[validate(length(min = 1, max = 100))]
    pub well: String,
    #[validate(length(max = 100))]
    pub trans: Option<String>,
    pub date: NaiveDate,
    pub description: Option<String>,
}

impl NewJob {
    fn trimmed(self) -> Self {
        let blank_to_none = |s: Option<String>| {
            s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        };
        Self {
            rig: self.rig.trim().to_string(),
            location: self.location.trim().to_string(),
            well: self.well.trim().to_string(),
            trans: blank_to_none(self.trans),
            description: blank_to_none(self.description),
            ..self
        }
    }
}

/// A row of the job list.
#[derive(Debug, Clone, Serialize)]
pub struct JobListEntry {
    pub job: job::Model,
    pub customer_name: String,
}

/// One line of a ticket in a job's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketLineView {
    pub item_id: i64,
    pub serial_number: String,
    pub category: String,
    /// Delivery lines only.
    pub is_returnable: Option<bool>,
    /// Receiving lines only.
    pub received_status: Option<ItemStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketHistoryEntry {
    pub kind: TicketKind,
    pub ticket_id: i64,
    pub ticket_number: String,
    pub ticket_date: DateTime<Utc>,
    pub created_by: Option<String>,
    pub lines: Vec<TicketLineView>,
}

/// Everything the job page shows.
#[derive(Debug, Clone, Serialize)]
pub struct JobDetail {
    pub job: job::Model,
    pub customer: customer::Model,
    /// Delivery and receiving tickets, newest first.
    pub history: Vec<TicketHistoryEntry>,
    pub still_out: Vec<ItemView>,
}

#[derive(Clone)]
pub struct JobService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl JobService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Opens a job and assigns it the next `{type}-NNN` number.
    #[instrument(skip(self))]
    pub async fn create_job(&self, new_job: NewJob) -> Result<job::Model, ServiceError> {
        let new_job = new_job.trimmed();
        new_job.validate()?;

        let db = self.db_pool.as_ref();
        let job = db
            .transaction::<_, job::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    customer::Entity::find_by_id(new_job.customer_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Customer {} not found",
                                new_job.customer_id
                            ))
                        })?;

                    let job_number =
                        next_identifier(txn, SequenceScope::Job(new_job.job_type)).await?;

                    Ok(job::ActiveModel {
                        job_type: Set(new_job.job_type),
                        job_number: Set(job_number),
                        customer_id: Set(new_job.customer_id),
                        rig: Set(new_job.rig),
                        location: Set(new_job.location),
                        well: Set(new_job.well),
                        trans: Set(new_job.trans),
                        date: Set(new_job.date),
                        description: Set(new_job.description),
                        status: Set(JobStatus::Open),
                        created_at: Set(Utc::now()),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?)
                })
            })
            .await?;

        info!(job_id = job.id, job_number = %job.job_number, "Job created");
        self.event_sender
            .send_or_log(Event::JobCreated {
                job_id: job.id,
                job_number: job.job_number.clone(),
            })
            .await;

        Ok(job)
    }

    /// Jobs whose number, customer name or date contains `search`, newest
    /// date first.
    #[instrument(skip(self))]
    pub async fn list_jobs(&self, search: Option<&str>) -> Result<Vec<JobListEntry>, ServiceError> {
        let db = self.db_pool.as_ref();
        let term = search.map(|s| s.trim().to_lowercase()).unwrap_or_default();

        let rows = job::Entity::find()
            .find_also_related(customer::Entity)
            .order_by_desc(job::Column::Date)
            .order_by_desc(job::Column::Id)
            .all(db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(job, customer)| JobListEntry {
                customer_name: customer.map(|c| c.name).unwrap_or_default(),
                job,
            })
            .filter(|entry| {
                term.is_empty()
                    || entry.job.job_number.to_lowercase().contains(&term)
                    || entry.customer_name.to_lowercase().contains(&term)
                    || entry.job.date.to_string().contains(&term)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn find_job_by_number(&self, job_number: &str) -> Result<job::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        job::Entity::find()
            .filter(job::Column::JobNumber.eq(job_number.trim()))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Job {} not found", job_number)))
    }

    /// The job with its ticket history and the items still out on it.
    #[instrument(skip(self))]
    pub async fn job_detail(&self, job_id: i64) -> Result<JobDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let job = find_job(db, job_id).await?;
        let customer = customer::Entity::find_by_id(job.customer_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", job.customer_id))
            })?;

        let mut history = Vec::new();

        let deliveries = delivery_ticket::Entity::find()
            .filter(delivery_ticket::Column::JobId.eq(job_id))
            .all(db)
            .await?;
        let mut delivery_lines: HashMap<i64, Vec<TicketLineView>> = HashMap::new();
        if !deliveries.is_empty() {
            let lines = delivery_ticket_item::Entity::find()
                .find_also_related(inventory_item::Entity)
                .filter(
                    delivery_ticket_item::Column::TicketId
                        .is_in(deliveries.iter().map(|t| t.id)),
                )
                .order_by_asc(delivery_ticket_item::Column::Id)
                .all(db)
                .await?;
            let categories = category_names(db).await?;
            for (line, item) in lines {
                let (serial_number, category) = describe(item, &categories);
                delivery_lines
                    .entry(line.ticket_id)
                    .or_default()
                    .push(TicketLineView {
                        item_id: line.item_id,
                        serial_number,
                        category,
                        is_returnable: Some(line.is_returnable),
                        received_status: None,
                    });
            }
        }
        for ticket in deliveries {
            history.push(TicketHistoryEntry {
                kind: TicketKind::Delivery,
                lines: delivery_lines.remove(&ticket.id).unwrap_or_default(),
                ticket_id: ticket.id,
                ticket_number: ticket.ticket_number,
                ticket_date: ticket.ticket_date,
                created_by: ticket.created_by,
            });
        }

        let receipts = receiving_ticket::Entity::find()
            .filter(receiving_ticket::Column::JobId.eq(job_id))
            .all(db)
            .await?;
        let mut receiving_lines: HashMap<i64, Vec<TicketLineView>> = HashMap::new();
        if !receipts.is_empty() {
            let lines = receiving_ticket_item::Entity::find()
                .find_also_related(inventory_item::Entity)
                .filter(
                    receiving_ticket_item::Column::TicketId.is_in(receipts.iter().map(|t| t.id)),
                )
                .order_by_asc(receiving_ticket_item::Column::Id)
                .all(db)
                .await?;
            let categories = category_names(db).await?;
            for (line, item) in lines {
                let (serial_number, category) = describe(item, &categories);
                receiving_lines
                    .entry(line.ticket_id)
                    .or_default()
                    .push(TicketLineView {
                        item_id: line.item_id,
                        serial_number,
                        category,
                        is_returnable: None,
                        received_status: Some(line.received_status),
                    });
            }
        }
        for ticket in receipts {
            history.push(TicketHistoryEntry {
                kind: TicketKind::Receiving,
                lines: receiving_lines.remove(&ticket.id).unwrap_or_default(),
                ticket_id: ticket.id,
                ticket_number: ticket.ticket_number,
                ticket_date: ticket.ticket_date,
                created_by: ticket.created_by,
            });
        }

        history.sort_by(|a, b| b.ticket_date.cmp(&a.ticket_date));

        let out: Vec<i64> = still_out_ids(db, job_id).await?.into_iter().collect();
        let still_out = load_item_views(db, Some(out.as_slice())).await?;

        Ok(JobDetail {
            job,
            customer,
            history,
            still_out,
        })
    }

    #[instrument(skip(self))]
    pub async fn create_customer(&self, name: &str) -> Result<customer::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Customer name is required".to_string(),
            ));
        }

        if customer::Entity::find()
            .filter(customer::Column::Name.eq(name))
            .one(db)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "Customer '{}' already exists",
                name
            )));
        }

        let customer = customer::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(customer_id = customer.id, name = %customer.name, "Customer created");
        Ok(customer)
    }

    /// Creates or replaces the customer's contract and its category set.
    #[instrument(skip(self))]
    pub async fn set_contract(
        &self,
        customer_id: i64,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        category_ids: &[i64],
    ) -> Result<contract::Model, ServiceError> {
        if let Some(end) = end_date {
            if end < start_date {
                return Err(ServiceError::ValidationError(
                    "Contract end date precedes its start date".to_string(),
                ));
            }
        }

        let category_ids: BTreeSet<i64> = category_ids.iter().copied().collect();
        let db = self.db_pool.as_ref();
        let contract = db
            .transaction::<_, contract::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    customer::Entity::find_by_id(customer_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Customer {} not found", customer_id))
                        })?;

                    let known = product_category::Entity::find()
                        .filter(product_category::Column::Id.is_in(category_ids.iter().copied()))
                        .count(txn)
                        .await?;
                    if known as usize != category_ids.len() {
                        return Err(ServiceError::NotFound(
                            "One or more contract categories do not exist".to_string(),
                        ));
                    }

                    let contract = match contract::Entity::find()
                        .filter(contract::Column::CustomerId.eq(customer_id))
                        .one(txn)
                        .await?
                    {
                        Some(existing) => {
                            let mut active: contract::ActiveModel = existing.into();
                            active.start_date = Set(start_date);
                            active.end_date = Set(end_date);
                            active.update(txn).await?
                        }
                        None => {
                            contract::ActiveModel {
                                customer_id: Set(customer_id),
                                start_date: Set(start_date),
                                end_date: Set(end_date),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await?
                        }
                    };

                    contract_category::Entity::delete_many()
                        .filter(contract_category::Column::ContractId.eq(contract.id))
                        .exec(txn)
                        .await?;
                    if !category_ids.is_empty() {
                        contract_category::Entity::insert_many(category_ids.iter().map(|id| {
                            contract_category::ActiveModel {
                                contract_id: Set(contract.id),
                                category_id: Set(*id),
                            }
                        }))
                        .exec_without_returning(txn)
                        .await?;
                    }

                    Ok(contract)
                })
            })
            .await?;

        info!(customer_id, contract_id = contract.id, "Contract saved");
        Ok(contract)
    }

    /// Deletes a customer that has no jobs.
    #[instrument(skip(self))]
    pub async fn delete_customer(&self, customer_id: i64) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let customer = customer::Entity::find_by_id(customer_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;

        let jobs = job::Entity::find()
            .filter(job::Column::CustomerId.eq(customer_id))
            .count(db)
            .await?;
        if jobs > 0 {
            warn!(customer_id, jobs, "Refusing to delete customer with jobs");
            return Err(ServiceError::Conflict(format!(
                "Customer '{}' has {} job(s)",
                customer.name, jobs
            )));
        }

        customer::Entity::delete_by_id(customer_id).exec(db).await?;
        info!(customer_id, name = %customer.name, "Customer deleted");
        Ok(())
    }
}

async fn category_names<C: sea_orm::ConnectionTrait>(
    conn: &C,
) -> Result<HashMap<i64, String>, ServiceError> {
    Ok(product_category::Entity::find()
        .all(conn)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect())
}

fn describe(
    item: Option<inventory_item::Model>,
    categories: &HashMap<i64, String>,
) -> (String, String) {
    match item {
        Some(item) => {
            let category = categories
                .get(&item.category_id)
                .cloned()
                .unwrap_or_default();
            (item.serial_number, category)
        }
        None => (String::new(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_job() -> NewJob {
        NewJob {
            job_type: JobType::Fishing,
            customer_id: 1,
            rig: "  EDC-54 ".into(),
            location: "Western Desert".into(),
            well: "W-7".into(),
            trans: Some("   ".into()),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            description: None,
        }
    }

    #[test]
    fn trimming_blanks_optional_fields() {
        let job = new_job().trimmed();
        assert_eq!(job.rig, "EDC-54");
        assert_eq!(job.trans, None);
        assert!(job.validate().is_ok());
    }

    #[test]
    fn rig_is_required() {
        let mut job = new_job();
        job.rig = "   ".into();
        assert!(job.trimmed().validate().is_err());
    }
}
