use crate::{
    db::DbPool,
    entities::{contract, contract_category, customer, inventory_item, job},
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Serials of the items whose category the contract does not cover.
///
/// `None` means the customer has no contract, which flags every item.
pub fn flag_out_of_contract<'a>(
    contracted: Option<&HashSet<i64>>,
    items: impl IntoIterator<Item = &'a inventory_item::Model>,
) -> Vec<String> {
    items
        .into_iter()
        .filter(|item| contracted.map_or(true, |c| !c.contains(&item.category_id)))
        .map(|item| item.serial_number.clone())
        .collect()
}

/// Checks selected items against a customer's contracted categories.
#[derive(Clone)]
pub struct ContractService {
    db_pool: Arc<DbPool>,
}

impl ContractService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Serial numbers of the candidate items outside the customer's contract.
    #[instrument(skip(self))]
    pub async fn out_of_contract(
        &self,
        customer_id: i64,
        item_ids: &[i64],
    ) -> Result<Vec<String>, ServiceError> {
        if item_ids.is_empty() {
            return Err(ServiceError::InvalidInput("No item IDs provided".to_string()));
        }

        let db = self.db_pool.as_ref();
        customer::Entity::find_by_id(customer_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;

        let contracted: Option<HashSet<i64>> = match contract::Entity::find()
            .filter(contract::Column::CustomerId.eq(customer_id))
            .one(db)
            .await?
        {
            Some(contract) => Some(
                contract_category::Entity::find()
                    .filter(contract_category::Column::ContractId.eq(contract.id))
                    .all(db)
                    .await?
                    .into_iter()
                    .map(|cc| cc.category_id)
                    .collect(),
            ),
            None => None,
        };

        let items = inventory_item::Entity::find()
            .filter(inventory_item::Column::Id.is_in(item_ids.iter().copied()))
            .order_by_asc(inventory_item::Column::SerialNumber)
            .all(db)
            .await?;

        let flagged = flag_out_of_contract(contracted.as_ref(), &items);
        debug!(
            customer_id,
            has_contract = contracted.is_some(),
            flagged = flagged.len(),
            "Contract check"
        );
        Ok(flagged)
    }

    /// Same check, for the customer a job belongs to.
    #[instrument(skip(self))]
    pub async fn out_of_contract_for_job(
        &self,
        job_id: i64,
        item_ids: &[i64],
    ) -> Result<Vec<String>, ServiceError> {
        let db = self.db_pool.as_ref();
        let job = job::Entity::find_by_id(job_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Job {} not found", job_id)))?;
        self.out_of_contract(job.customer_id, item_ids).await
    }
}
