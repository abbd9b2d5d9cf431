use crate::{
    db::DbPool,
    entities::{inventory_item, job, product_category, ItemStatus, JobStatus, YardLocation},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Canonical serial number form: trimmed and uppercased.
pub fn canonical_serial(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// The single gate every status change passes through.
///
/// All transitions are currently permitted; a transition table only has to be
/// added to [`transition_allowed`].
pub fn apply_transition(from: ItemStatus, to: ItemStatus) -> Result<ItemStatus, ServiceError> {
    if transition_allowed(from, to) {
        Ok(to)
    } else {
        Err(ServiceError::InvalidOperation(format!(
            "Status change from '{}' to '{}' is not allowed",
            from, to
        )))
    }
}

fn transition_allowed(_from: ItemStatus, _to: ItemStatus) -> bool {
    true
}

/// Locks the given items `FOR UPDATE`, optionally only those in `status`.
pub(crate) async fn lock_items<C: ConnectionTrait>(
    conn: &C,
    item_ids: &[i64],
    status: Option<ItemStatus>,
) -> Result<Vec<inventory_item::Model>, ServiceError> {
    if item_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = inventory_item::Entity::find()
        .filter(inventory_item::Column::Id.is_in(item_ids.iter().copied()));
    if let Some(status) = status {
        query = query.filter(inventory_item::Column::Status.eq(status));
    }

    Ok(query.lock_exclusive().all(conn).await?)
}

/// Moves `items` to `to` through [`apply_transition`] and writes the change in
/// one statement. `note` replaces the status note.
pub(crate) async fn transition_items<C: ConnectionTrait>(
    conn: &C,
    items: &[inventory_item::Model],
    to: ItemStatus,
    note: Option<&str>,
) -> Result<(), ServiceError> {
    if items.is_empty() {
        return Ok(());
    }

    for item in items {
        apply_transition(item.status, to)?;
    }

    inventory_item::Entity::update_many()
        .col_expr(inventory_item::Column::Status, Expr::value(to.as_str()))
        .col_expr(
            inventory_item::Column::StatusNote,
            Expr::value(note.map(str::to_string)),
        )
        .col_expr(inventory_item::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(inventory_item::Column::Id.is_in(items.iter().map(|i| i.id)))
        .exec(conn)
        .await?;

    Ok(())
}

/// Items joined with their category, ordered by serial number.
pub(crate) async fn load_item_views<C: ConnectionTrait>(
    conn: &C,
    item_ids: Option<&[i64]>,
) -> Result<Vec<ItemView>, ServiceError> {
    let mut query = inventory_item::Entity::find()
        .find_also_related(product_category::Entity)
        .order_by_asc(inventory_item::Column::SerialNumber);
    if let Some(ids) = item_ids {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        query = query.filter(inventory_item::Column::Id.is_in(ids.iter().copied()));
    }

    Ok(query
        .all(conn)
        .await?
        .into_iter()
        .map(ItemView::from)
        .collect())
}

/// An item as shown in lists and search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemView {
    pub id: i64,
    pub serial_number: String,
    pub category_id: i64,
    pub category: String,
    pub unit: Option<String>,
    pub location: YardLocation,
    pub location_label: String,
    pub status: ItemStatus,
    pub status_note: Option<String>,
}

impl ItemView {
    /// Case-insensitive substring match on serial number or category name.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || self.serial_number.to_lowercase().contains(&term)
            || self.category.to_lowercase().contains(&term)
    }
}

impl From<(inventory_item::Model, Option<product_category::Model>)> for ItemView {
    fn from((item, category): (inventory_item::Model, Option<product_category::Model>)) -> Self {
        let (category, unit) = category
            .map(|c| (c.name, c.unit))
            .unwrap_or_default();
        Self {
            id: item.id,
            serial_number: item.serial_number,
            category_id: item.category_id,
            category,
            unit,
            location: item.location,
            location_label: item.location.label().to_string(),
            status: item.status,
            status_note: item.status_note,
        }
    }
}

/// Which items a filtered list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFilter {
    All,
    Status(ItemStatus),
    /// Items flagged for rework or failed inspection.
    Attention,
}

impl ItemFilter {
    pub fn title(&self) -> String {
        match self {
            ItemFilter::All => "Inventory Details".to_string(),
            ItemFilter::Status(status) => format!("Items: {}", status.label()),
            ItemFilter::Attention => "Items Requiring Attention".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: ItemStatus,
    pub label: &'static str,
    pub count: u64,
}

/// Landing page numbers.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub total_items: u64,
    pub by_status: Vec<StatusCount>,
    /// Items in a status that needs attention (re-cut, lih-dbr).
    pub attention: u64,
    /// Open jobs, most recent date first.
    pub open_jobs: Vec<job::Model>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category_id: i64,
    pub name: String,
    pub unit: Option<String>,
    pub count: u64,
}

/// Per-category item counts at one yard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationSummary {
    pub location: YardLocation,
    pub label: &'static str,
    pub categories: Vec<CategoryCount>,
    pub total: u64,
}

/// Fields for a single hand-entered item.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub serial_number: String,
    pub category_id: i64,
    pub location: YardLocation,
    pub status: ItemStatus,
}

/// The Item Store: owns every item's status and location.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a category, or returns the existing one with that exact name.
    #[instrument(skip(self))]
    pub async fn create_category(
        &self,
        name: &str,
        unit: Option<&str>,
    ) -> Result<product_category::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Category name is required".to_string(),
            ));
        }

        if let Some(existing) = product_category::Entity::find()
            .filter(product_category::Column::Name.eq(name))
            .one(db)
            .await?
        {
            return Ok(existing);
        }

        let category = product_category::ActiveModel {
            name: Set(name.to_string()),
            unit: Set(unit.map(str::trim).filter(|u| !u.is_empty()).map(str::to_string)),
            quantity: Set(0),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(category_id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    /// Adds one item. The serial number is stored in canonical form.
    #[instrument(skip(self))]
    pub async fn add_item(&self, new_item: NewItem) -> Result<inventory_item::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let serial = canonical_serial(&new_item.serial_number);
        if serial.is_empty() {
            return Err(ServiceError::ValidationError(
                "Serial number is required".to_string(),
            ));
        }

        if self.find_by_serial(&serial).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Item with serial number {} already exists",
                serial
            )));
        }

        product_category::Entity::find_by_id(new_item.category_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Category {} not found", new_item.category_id))
            })?;

        let item = inventory_item::ActiveModel {
            serial_number: Set(serial),
            category_id: Set(new_item.category_id),
            location: Set(new_item.location),
            status: Set(new_item.status),
            status_note: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(item_id = item.id, serial_number = %item.serial_number, "Item added");
        Ok(item)
    }

    /// Sets the status of every selected item, or of none of them.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        item_ids: &[i64],
        status: ItemStatus,
        note: Option<String>,
    ) -> Result<Vec<inventory_item::Model>, ServiceError> {
        let ids: Vec<i64> = item_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "You must select at least one item.".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();
        let updated = db
            .transaction::<_, Vec<inventory_item::Model>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let items = lock_items(txn, &ids, None).await?;
                    if items.len() != ids.len() {
                        return Err(ServiceError::NotFound(format!(
                            "{} of {} selected items do not exist",
                            ids.len() - items.len(),
                            ids.len()
                        )));
                    }

                    transition_items(txn, &items, status, note.as_deref()).await?;

                    Ok(inventory_item::Entity::find()
                        .filter(inventory_item::Column::Id.is_in(ids))
                        .order_by_asc(inventory_item::Column::Id)
                        .all(txn)
                        .await?)
                })
            })
            .await?;

        info!(item_count = updated.len(), %status, "Item statuses set");
        self.event_sender
            .send_or_log(Event::ItemsStatusChanged {
                item_ids: updated.iter().map(|i| i.id).collect(),
                status,
            })
            .await;

        Ok(updated)
    }

    /// Looks an item up by serial number, in any spelling of its case.
    #[instrument(skip(self))]
    pub async fn find_by_serial(
        &self,
        serial: &str,
    ) -> Result<Option<inventory_item::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        Ok(inventory_item::Entity::find()
            .filter(inventory_item::Column::SerialNumber.eq(canonical_serial(serial)))
            .one(db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn find_by_status_and_location(
        &self,
        status: ItemStatus,
        location: YardLocation,
    ) -> Result<Vec<inventory_item::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        Ok(inventory_item::Entity::find()
            .filter(inventory_item::Column::Status.eq(status))
            .filter(inventory_item::Column::Location.eq(location))
            .order_by_asc(inventory_item::Column::SerialNumber)
            .all(db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<Dashboard, ServiceError> {
        let db = self.db_pool.as_ref();

        let mut by_status = Vec::with_capacity(ItemStatus::ALL.len());
        for status in ItemStatus::ALL {
            let count = inventory_item::Entity::find()
                .filter(inventory_item::Column::Status.eq(status))
                .count(db)
                .await?;
            by_status.push(StatusCount {
                status,
                label: status.label(),
                count,
            });
        }

        let total_items = by_status.iter().map(|s| s.count).sum();
        let attention = by_status
            .iter()
            .filter(|s| s.status.needs_attention())
            .map(|s| s.count)
            .sum();

        let open_jobs = job::Entity::find()
            .filter(job::Column::Status.eq(JobStatus::Open))
            .order_by_desc(job::Column::Date)
            .order_by_desc(job::Column::Id)
            .all(db)
            .await?;

        Ok(Dashboard {
            total_items,
            by_status,
            attention,
            open_jobs,
        })
    }

    /// Item counts per yard and category, all statuses included.
    ///
    /// With a search term, only categories holding at least one item whose
    /// serial or category name matches are listed.
    #[instrument(skip(self))]
    pub async fn location_summary(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<LocationSummary>, ServiceError> {
        let db = self.db_pool.as_ref();
        let items = load_item_views(db, None).await?;

        let matching_categories: Option<HashSet<i64>> = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|term| {
                items
                    .iter()
                    .filter(|i| i.matches(term))
                    .map(|i| i.category_id)
                    .collect()
            });

        let mut counts: BTreeMap<(YardLocation, String, i64), (Option<String>, u64)> =
            BTreeMap::new();
        for item in &items {
            if let Some(allowed) = &matching_categories {
                if !allowed.contains(&item.category_id) {
                    continue;
                }
            }
            let entry = counts
                .entry((item.location, item.category.clone(), item.category_id))
                .or_insert_with(|| (item.unit.clone(), 0));
            entry.1 += 1;
        }

        Ok(YardLocation::ALL
            .into_iter()
            .map(|location| {
                let categories: Vec<CategoryCount> = counts
                    .iter()
                    .filter(|((loc, _, _), _)| *loc == location)
                    .map(|((_, name, category_id), (unit, count))| CategoryCount {
                        category_id: *category_id,
                        name: name.clone(),
                        unit: unit.clone(),
                        count: *count,
                    })
                    .collect();
                let total = categories.iter().map(|c| c.count).sum();
                LocationSummary {
                    location,
                    label: location.label(),
                    categories,
                    total,
                }
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn filtered_items(
        &self,
        filter: ItemFilter,
        search: Option<&str>,
    ) -> Result<Vec<ItemView>, ServiceError> {
        let db = self.db_pool.as_ref();
        let items = load_item_views(db, None).await?;
        let term = search.unwrap_or_default();

        Ok(items
            .into_iter()
            .filter(|item| match filter {
                ItemFilter::All => true,
                ItemFilter::Status(status) => item.status == status,
                ItemFilter::Attention => item.status.needs_attention(),
            })
            .filter(|item| item.matches(term))
            .collect())
    }

    /// The items behind one cell of the location summary.
    #[instrument(skip(self))]
    pub async fn items_in_category_at(
        &self,
        category_id: i64,
        location: YardLocation,
    ) -> Result<Vec<inventory_item::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        Ok(inventory_item::Entity::find()
            .filter(inventory_item::Column::CategoryId.eq(category_id))
            .filter(inventory_item::Column::Location.eq(location))
            .order_by_asc(inventory_item::Column::SerialNumber)
            .all(db)
            .await?)
    }

    /// Refreshes every category's cached quantity from a live count.
    #[instrument(skip(self))]
    pub async fn recalculate_category_quantities(&self) -> Result<Vec<CategoryCount>, ServiceError> {
        let db = self.db_pool.as_ref();
        let counts = db
            .transaction::<_, Vec<CategoryCount>, ServiceError>(|txn| {
                Box::pin(async move { recalculate_quantities(txn).await })
            })
            .await?;

        info!(category_count = counts.len(), "Category quantities recalculated");
        Ok(counts)
    }

    /// Deletes a category that no item references.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, category_id: i64) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let category = product_category::Entity::find_by_id(category_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", category_id)))?;

        let in_use = inventory_item::Entity::find()
            .filter(inventory_item::Column::CategoryId.eq(category_id))
            .count(db)
            .await?;
        if in_use > 0 {
            warn!(category_id, in_use, "Refusing to delete category in use");
            return Err(ServiceError::Conflict(format!(
                "Category '{}' is used by {} item(s)",
                category.name, in_use
            )));
        }

        product_category::Entity::delete_by_id(category_id)
            .exec(db)
            .await?;
        info!(category_id, name = %category.name, "Category deleted");
        Ok(())
    }
}

/// Sets each category's cached quantity to its item count, on `conn`.
pub(crate) async fn recalculate_quantities<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<CategoryCount>, ServiceError> {
    let categories = product_category::Entity::find()
        .order_by_asc(product_category::Column::Name)
        .all(conn)
        .await?;

    let mut counts = Vec::with_capacity(categories.len());
    for category in categories {
        let count = inventory_item::Entity::find()
            .filter(inventory_item::Column::CategoryId.eq(category.id))
            .count(conn)
            .await?;

        let quantity = i32::try_from(count).map_err(|_| {
            ServiceError::InternalError(format!("Item count {} overflows quantity", count))
        })?;
        let category_id = category.id;
        let name = category.name.clone();
        let unit = category.unit.clone();
        if category.quantity != quantity {
            let mut active: product_category::ActiveModel = category.into();
            active.quantity = Set(quantity);
            active.update(conn).await?;
        }

        counts.push(CategoryCount {
            category_id,
            name,
            unit,
            count,
        });
    }

    Ok(counts)
}
