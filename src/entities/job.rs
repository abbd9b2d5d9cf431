use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Job type prefix; the code is the first half of every job number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(4))")]
pub enum JobType {
    #[sea_orm(string_value = "1101")]
    #[serde(rename = "1101")]
    Fishing,
    #[sea_orm(string_value = "1102")]
    #[serde(rename = "1102")]
    Rental,
    #[sea_orm(string_value = "1103")]
    #[serde(rename = "1103")]
    Jars,
    #[sea_orm(string_value = "1104")]
    #[serde(rename = "1104")]
    MachineShop,
}

impl JobType {
    pub fn code(&self) -> &'static str {
        match self {
            JobType::Fishing => "1101",
            JobType::Rental => "1102",
            JobType::Jars => "1103",
            JobType::MachineShop => "1104",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        [
            JobType::Fishing,
            JobType::Rental,
            JobType::Jars,
            JobType::MachineShop,
        ]
        .into_iter()
        .find(|t| t.code() == code)
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobType::Fishing => "1101 (Fishing)",
            JobType::Rental => "1102 (Rental)",
            JobType::Jars => "1103 (Jars)",
            JobType::MachineShop => "1104 (Machine shop)",
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "closed")]
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub job_type: JobType,
    /// `{type}-{NNN}`, assigned once at creation.
    #[sea_orm(unique)]
    pub job_number: String,
    pub customer_id: i64,
    pub rig: String,
    pub location: String,
    pub well: String,
    /// Transportation details.
    pub trans: Option<String>,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_delete = "Restrict"
    )]
    Customer,
    #[sea_orm(has_many = "super::delivery_ticket::Entity")]
    DeliveryTickets,
    #[sea_orm(has_many = "super::receiving_ticket::Entity")]
    ReceivingTickets,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::delivery_ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryTickets.def()
    }
}

impl Related<super::receiving_ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReceivingTickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
