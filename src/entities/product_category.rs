use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A kind of physical item (e.g. "Drill Pipe 5in").
///
/// `quantity` is a cached count refreshed by
/// [`InventoryService::recalculate_category_quantities`](crate::services::inventory::InventoryService::recalculate_category_quantities);
/// it is never read back as a source of truth.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub name: String,
    /// Unit-of-measure label, e.g. "joint", "pcs".
    pub unit: Option<String>,
    pub quantity: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory_item::Entity")]
    InventoryItems,
    #[sea_orm(has_many = "super::contract_category::Entity")]
    ContractCategories,
}

impl Related<super::inventory_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryItems.def()
    }
}

impl Related<super::contract::Entity> for Entity {
    fn to() -> RelationDef {
        super::contract_category::Relation::Contract.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::contract_category::Relation::Category.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
