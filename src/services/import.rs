//! Bulk upsert of inventory rows from the spreadsheet import template.
//!
//! Rows are normalized and validated one by one; a bad row is reported and
//! skipped while the rest of the batch continues. Everything that passes is
//! written in a single transaction once the whole batch has been evaluated.

use crate::{
    config::ImportConfig,
    db::DbPool,
    entities::{inventory_item, product_category, ItemStatus, YardLocation},
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::{apply_transition, canonical_serial, recalculate_quantities},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub const COLUMN_CATEGORY: &str = "CategoryName";
pub const COLUMN_SERIAL: &str = "SerialNumber";
pub const COLUMN_LOCATION: &str = "Location";
pub const COLUMN_STATUS: &str = "Status";
pub const COLUMN_UNIT: &str = "Unit";

const REQUIRED_COLUMNS: [&str; 3] = [COLUMN_CATEGORY, COLUMN_SERIAL, COLUMN_LOCATION];

const LOCATION_ALIASES: &[(&str, YardLocation)] = &[
    ("maadi-yard", YardLocation::MaadiYard),
    ("maadi", YardLocation::MaadiYard),
    ("abu-rudies-yard", YardLocation::AbuRudiesYard),
    ("abu-rudies", YardLocation::AbuRudiesYard),
    ("aburudies", YardLocation::AbuRudiesYard),
];

const STATUS_ALIASES: &[(&str, ItemStatus)] = &[
    ("available", ItemStatus::Available),
    ("on-job", ItemStatus::OnJob),
    ("onjob", ItemStatus::OnJob),
    ("sold", ItemStatus::Sold),
    ("re-cut", ItemStatus::ReCut),
    ("recut", ItemStatus::ReCut),
    ("lih-dbr", ItemStatus::LihDbr),
    ("lihdbr", ItemStatus::LihDbr),
    ("lih", ItemStatus::Lih),
    ("junk", ItemStatus::Junk),
    ("pending-inspection", ItemStatus::PendingInspection),
    ("pending", ItemStatus::PendingInspection),
];

/// One data row of the import template, cells as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImportRow {
    pub category_name: String,
    pub serial_number: String,
    pub location: String,
    pub status: String,
    pub unit: String,
}

impl ImportRow {
    pub fn is_blank(&self) -> bool {
        [
            &self.category_name,
            &self.serial_number,
            &self.location,
            &self.status,
            &self.unit,
        ]
        .iter()
        .all(|cell| cell.trim().is_empty())
    }
}

/// A row after the normalization pass. Location and status hold canonical
/// codes when an alias matched and the trimmed input otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    pub serial_number: String,
    pub category_name: String,
    pub location: String,
    pub status: String,
    pub unit: Option<String>,
}

impl From<&ImportRow> for NormalizedRow {
    fn from(row: &ImportRow) -> Self {
        let unit = row.unit.trim();
        Self {
            serial_number: canonical_serial(&row.serial_number),
            category_name: row.category_name.trim().to_string(),
            location: normalize_location(&row.location),
            status: normalize_status(&row.status),
            unit: (!unit.is_empty()).then(|| unit.to_string()),
        }
    }
}

fn alias_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    for c in raw.trim().to_lowercase().chars() {
        let c = if c == ' ' || c == '_' { '-' } else { c };
        if c == '-' && key.ends_with('-') {
            continue;
        }
        key.push(c);
    }
    key
}

pub fn normalize_location(raw: &str) -> String {
    let key = alias_key(raw);
    LOCATION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, location)| location.as_str().to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

/// A blank status cell means the item is available.
pub fn normalize_status(raw: &str) -> String {
    if raw.trim().is_empty() {
        return ItemStatus::Available.as_str().to_string();
    }
    let key = alias_key(raw);
    STATUS_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, status)| status.as_str().to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

/// A per-row problem, keyed by spreadsheet line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    pub line: usize,
    pub serial_number: Option<String>,
    pub message: String,
}

/// Outcome of one import batch.
///
/// Every non-blank input row lands in exactly one of `created`, `updated`,
/// `unchanged` or `skipped`. Each skipped row has an entry in `errors`; each
/// unchanged row has one in `warnings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub errors: Vec<RowIssue>,
    pub warnings: Vec<RowIssue>,
}

impl ImportSummary {
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.unchanged + self.skipped
    }
}

/// Fails unless every required column is present. `Status` and `Unit` are
/// optional.
pub fn validate_columns<S: AsRef<str>>(headers: &[S]) -> Result<(), ServiceError> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|required| {
            !headers
                .iter()
                .any(|h| h.as_ref().trim().eq_ignore_ascii_case(required))
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::ImportError(format!(
            "Missing required column(s): {}",
            missing.join(", ")
        )))
    }
}

/// Reads the import template from CSV. Fully blank rows are kept so line
/// numbers stay aligned; [`ImportService::reconcile`] drops them.
pub fn read_import_csv<R: Read>(reader: R) -> Result<Vec<ImportRow>, ServiceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| ServiceError::ImportError(format!("Unreadable header row: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();
    validate_columns(&headers)?;

    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let category_at = position(COLUMN_CATEGORY);
    let serial_at = position(COLUMN_SERIAL);
    let location_at = position(COLUMN_LOCATION);
    let status_at = position(COLUMN_STATUS);
    let unit_at = position(COLUMN_UNIT);

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|e| {
            ServiceError::ImportError(format!("Unreadable data row {}: {}", index + 1, e))
        })?;
        let cell = |at: Option<usize>| {
            at.and_then(|i| record.get(i))
                .unwrap_or_default()
                .to_string()
        };
        rows.push(ImportRow {
            category_name: cell(category_at),
            serial_number: cell(serial_at),
            location: cell(location_at),
            status: cell(status_at),
            unit: cell(unit_at),
        });
    }

    Ok(rows)
}

pub fn read_import_file(path: &Path) -> Result<Vec<ImportRow>, ServiceError> {
    let file = std::fs::File::open(path).map_err(|e| {
        ServiceError::ImportError(format!("Cannot open {}: {}", path.display(), e))
    })?;
    read_import_csv(file)
}

/// A validated row and what to do with it.
#[derive(Debug)]
enum Planned {
    Create {
        serial_number: String,
        category: String,
        location: YardLocation,
        status: ItemStatus,
    },
    Update {
        item: inventory_item::Model,
        category: String,
        location: YardLocation,
        status: ItemStatus,
    },
}

#[derive(Clone)]
pub struct ImportService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    config: ImportConfig,
}

impl ImportService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: ImportConfig) -> Self {
        Self {
            db_pool,
            event_sender,
            config,
        }
    }

    fn line_of(&self, index: usize) -> usize {
        index + 1 + self.config.header_rows
    }

    /// Upserts the batch by serial number and reports what happened per row.
    #[instrument(skip(self, rows), fields(row_count = rows.len()))]
    pub async fn reconcile(&self, rows: Vec<ImportRow>) -> Result<ImportSummary, ServiceError> {
        let rows: Vec<(usize, NormalizedRow)> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !row.is_blank())
            .map(|(index, row)| (self.line_of(index), NormalizedRow::from(row)))
            .collect();

        if rows.len() > self.config.max_rows {
            return Err(ServiceError::ImportError(format!(
                "Import has {} rows; at most {} are accepted per batch",
                rows.len(),
                self.config.max_rows
            )));
        }

        let db = self.db_pool.as_ref();
        let categories: HashMap<String, product_category::Model> = product_category::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();
        let existing: HashMap<String, inventory_item::Model> = inventory_item::Entity::find()
            .filter(
                inventory_item::Column::SerialNumber
                    .is_in(rows.iter().map(|(_, r)| r.serial_number.clone())),
            )
            .all(db)
            .await?
            .into_iter()
            .map(|i| (i.serial_number.clone(), i))
            .collect();
        let category_names: HashMap<i64, &str> = categories
            .values()
            .map(|c| (c.id, c.name.as_str()))
            .collect();

        let mut summary = ImportSummary::default();
        let mut first_seen: HashMap<String, usize> = HashMap::new();
        let mut new_categories: BTreeMap<String, Option<String>> = BTreeMap::new();
        let mut plan = Vec::new();

        for (line, row) in rows {
            let mut reject = |message: String| {
                summary.skipped += 1;
                summary.errors.push(RowIssue {
                    line,
                    serial_number: (!row.serial_number.is_empty())
                        .then(|| row.serial_number.clone()),
                    message,
                });
            };

            if row.category_name.is_empty() {
                reject(format!("Row {}: Missing {}.", line, COLUMN_CATEGORY));
                continue;
            }
            if row.serial_number.is_empty() {
                reject(format!("Row {}: Missing {}.", line, COLUMN_SERIAL));
                continue;
            }
            if row.location.is_empty() {
                reject(format!("Row {}: Missing {}.", line, COLUMN_LOCATION));
                continue;
            }
            let Some(location) = YardLocation::from_code(&row.location) else {
                reject(format!("Row {}: Invalid Location '{}'.", line, row.location));
                continue;
            };
            let Some(status) = ItemStatus::from_code(&row.status) else {
                reject(format!("Row {}: Invalid Status '{}'.", line, row.status));
                continue;
            };
            if let Some(first) = first_seen.get(&row.serial_number) {
                reject(format!(
                    "Row {}: Duplicate SerialNumber '{}' (first seen on row {}).",
                    line, row.serial_number, first
                ));
                continue;
            }
            first_seen.insert(row.serial_number.clone(), line);

            if !categories.contains_key(&row.category_name) {
                new_categories
                    .entry(row.category_name.clone())
                    .or_insert_with(|| row.unit.clone());
            }

            match existing.get(&row.serial_number) {
                Some(item) => {
                    let same_category = category_names
                        .get(&item.category_id)
                        .map_or(false, |name| *name == row.category_name);
                    if same_category && item.location == location && item.status == status {
                        summary.unchanged += 1;
                        summary.warnings.push(RowIssue {
                            line,
                            serial_number: Some(row.serial_number.clone()),
                            message: format!(
                                "Row {}: Item '{}' already exists (no changes).",
                                line, row.serial_number
                            ),
                        });
                    } else {
                        plan.push(Planned::Update {
                            item: item.clone(),
                            category: row.category_name,
                            location,
                            status,
                        });
                    }
                }
                None => plan.push(Planned::Create {
                    serial_number: row.serial_number,
                    category: row.category_name,
                    location,
                    status,
                }),
            }
        }

        let known_ids: HashMap<String, i64> = categories
            .into_iter()
            .map(|(name, c)| (name, c.id))
            .collect();

        let (created, updated) = db
            .transaction::<_, (usize, usize), ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut category_ids = known_ids;
                    for (name, unit) in new_categories {
                        let category = product_category::ActiveModel {
                            name: Set(name.clone()),
                            unit: Set(unit),
                            quantity: Set(0),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;
                        info!(category_id = category.id, %name, "Category created by import");
                        category_ids.insert(name, category.id);
                    }

                    let category_id = |name: &str| {
                        category_ids.get(name).copied().ok_or_else(|| {
                            ServiceError::InternalError(format!(
                                "Category '{}' was not resolved",
                                name
                            ))
                        })
                    };

                    let now = Utc::now();
                    let mut inserts = Vec::new();
                    let mut updated = 0;
                    for planned in plan {
                        match planned {
                            Planned::Create {
                                serial_number,
                                category,
                                location,
                                status,
                            } => inserts.push(inventory_item::ActiveModel {
                                serial_number: Set(serial_number),
                                category_id: Set(category_id(&category)?),
                                location: Set(location),
                                status: Set(status),
                                status_note: Set(None),
                                created_at: Set(now),
                                updated_at: Set(now),
                                ..Default::default()
                            }),
                            Planned::Update {
                                item,
                                category,
                                location,
                                status,
                            } => {
                                let status = apply_transition(item.status, status)?;
                                let mut active: inventory_item::ActiveModel = item.into();
                                active.category_id = Set(category_id(&category)?);
                                active.location = Set(location);
                                active.status = Set(status);
                                active.update(txn).await?;
                                updated += 1;
                            }
                        }
                    }

                    let created = inserts.len();
                    if !inserts.is_empty() {
                        inventory_item::Entity::insert_many(inserts)
                            .exec_without_returning(txn)
                            .await?;
                    }

                    recalculate_quantities(txn).await?;
                    Ok((created, updated))
                })
            })
            .await
            .map_err(|e| {
                let e = ServiceError::from(e);
                error!(error = %e, "Import rolled back");
                e
            })?;

        summary.created = created;
        summary.updated = updated;

        if !summary.errors.is_empty() {
            warn!(skipped = summary.skipped, "Import rows rejected");
        }
        info!(
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            "Import applied"
        );
        self.event_sender
            .send_or_log(Event::InventoryImported {
                created: summary.created,
                updated: summary.updated,
                skipped: summary.skipped,
            })
            .await;

        Ok(summary)
    }
}
