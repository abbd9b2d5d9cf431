use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a physical item.
///
/// Stored as the short code used on import templates and printed documents.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ItemStatus {
    #[sea_orm(string_value = "available")]
    #[serde(rename = "available")]
    #[strum(serialize = "available")]
    Available,
    #[sea_orm(string_value = "on_job")]
    #[serde(rename = "on_job")]
    #[strum(serialize = "on_job")]
    OnJob,
    #[sea_orm(string_value = "sold")]
    #[serde(rename = "sold")]
    #[strum(serialize = "sold")]
    Sold,
    #[sea_orm(string_value = "re-cut")]
    #[serde(rename = "re-cut")]
    #[strum(serialize = "re-cut")]
    ReCut,
    #[sea_orm(string_value = "lih-dbr")]
    #[serde(rename = "lih-dbr")]
    #[strum(serialize = "lih-dbr")]
    LihDbr,
    #[sea_orm(string_value = "lih")]
    #[serde(rename = "lih")]
    #[strum(serialize = "lih")]
    Lih,
    #[sea_orm(string_value = "junk")]
    #[serde(rename = "junk")]
    #[strum(serialize = "junk")]
    Junk,
    #[sea_orm(string_value = "pending_inspection")]
    #[serde(rename = "pending_inspection")]
    #[strum(serialize = "pending_inspection")]
    PendingInspection,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 8] = [
        ItemStatus::Available,
        ItemStatus::OnJob,
        ItemStatus::Sold,
        ItemStatus::ReCut,
        ItemStatus::LihDbr,
        ItemStatus::Lih,
        ItemStatus::Junk,
        ItemStatus::PendingInspection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::OnJob => "on_job",
            ItemStatus::Sold => "sold",
            ItemStatus::ReCut => "re-cut",
            ItemStatus::LihDbr => "lih-dbr",
            ItemStatus::Lih => "lih",
            ItemStatus::Junk => "junk",
            ItemStatus::PendingInspection => "pending_inspection",
        }
    }

    /// Parses a canonical code. Human-friendly variants are handled by the
    /// import normalizer, not here.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == code)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Available => "Available",
            ItemStatus::OnJob => "On Job",
            ItemStatus::Sold => "Sold",
            ItemStatus::ReCut => "Re-cut",
            ItemStatus::LihDbr => "LIH-DBR",
            ItemStatus::Lih => "LIH",
            ItemStatus::Junk => "Junk",
            ItemStatus::PendingInspection => "Pending Inspection",
        }
    }

    /// Items flagged for rework or failed inspection.
    pub fn needs_attention(&self) -> bool {
        matches!(self, ItemStatus::ReCut | ItemStatus::LihDbr)
    }
}

/// Yard an item is stored at.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
pub enum YardLocation {
    #[sea_orm(string_value = "maadi-yard")]
    #[serde(rename = "maadi-yard")]
    #[strum(serialize = "maadi-yard")]
    MaadiYard,
    #[sea_orm(string_value = "abu-rudies-yard")]
    #[serde(rename = "abu-rudies-yard")]
    #[strum(serialize = "abu-rudies-yard")]
    AbuRudiesYard,
}

impl YardLocation {
    pub const ALL: [YardLocation; 2] = [YardLocation::MaadiYard, YardLocation::AbuRudiesYard];

    pub fn as_str(&self) -> &'static str {
        match self {
            YardLocation::MaadiYard => "maadi-yard",
            YardLocation::AbuRudiesYard => "abu-rudies-yard",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == code)
    }

    pub fn label(&self) -> &'static str {
        match self {
            YardLocation::MaadiYard => "Maadi Yard",
            YardLocation::AbuRudiesYard => "Abu Rudies Yard",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Canonical form: trimmed and uppercased.
    #[sea_orm(unique)]
    pub serial_number: String,
    pub category_id: i64,
    pub location: YardLocation,
    pub status: ItemStatus,
    /// Free-text reason attached to the current status (re-cut reason).
    pub status_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product_category::Entity",
        from = "Column::CategoryId",
        to = "super::product_category::Column::Id",
        on_delete = "Restrict"
    )]
    Category,
    #[sea_orm(has_many = "super::delivery_ticket_item::Entity")]
    DeliveryLines,
    #[sea_orm(has_many = "super::receiving_ticket_item::Entity")]
    ReceivingLines,
}

impl Related<super::product_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::delivery_ticket_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryLines.def()
    }
}

impl Related<super::receiving_ticket_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReceivingLines.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }

        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}
