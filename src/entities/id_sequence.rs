use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Last number handed out for one numbering scope.
///
/// `scope` is `job`, `delivery` or `receiving`; `scope_key` is the job type
/// code for jobs and the job id for tickets.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "id_sequences")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub scope: String,
    pub scope_key: String,
    pub last_value: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
