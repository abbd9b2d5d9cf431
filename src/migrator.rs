use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_inventory_tables::Migration),
            Box::new(m20250101_000002_create_job_tables::Migration),
            Box::new(m20250101_000003_create_ticket_tables::Migration),
            Box::new(m20250101_000004_create_id_sequences_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_inventory_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductCategories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductCategories::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ProductCategories::Name)
                                .string_len(200)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ProductCategories::Unit).string_len(100).null())
                        .col(
                            ColumnDef::new(ProductCategories::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InventoryItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryItems::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::SerialNumber)
                                .string_len(200)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::CategoryId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::Location).string_len(50).not_null())
                        .col(
                            ColumnDef::new(InventoryItems::Status)
                                .string_len(32)
                                .not_null()
                                .default("available"),
                        )
                        .col(ColumnDef::new(InventoryItems::StatusNote).text().null())
                        .col(
                            ColumnDef::new(InventoryItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_items_category_id")
                                .from(InventoryItems::Table, InventoryItems::CategoryId)
                                .to(ProductCategories::Table, ProductCategories::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_items_status_location")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::Status)
                        .col(InventoryItems::Location)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductCategories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum ProductCategories {
        Table,
        Id,
        Name,
        Unit,
        Quantity,
    }

    #[derive(DeriveIden)]
    pub enum InventoryItems {
        Table,
        Id,
        SerialNumber,
        CategoryId,
        Location,
        Status,
        StatusNote,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_job_tables {

    use super::m20250101_000001_create_inventory_tables::ProductCategories;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_job_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Customers::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Customers::Name)
                                .string_len(200)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Customers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Contracts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Contracts::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Contracts::CustomerId)
                                .big_integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Contracts::StartDate).date().not_null())
                        .col(ColumnDef::new(Contracts::EndDate).date().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_contracts_customer_id")
                                .from(Contracts::Table, Contracts::CustomerId)
                                .to(Customers::Table, Customers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ContractCategories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ContractCategories::ContractId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ContractCategories::CategoryId)
                                .big_integer()
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(ContractCategories::ContractId)
                                .col(ContractCategories::CategoryId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_contract_categories_contract_id")
                                .from(ContractCategories::Table, ContractCategories::ContractId)
                                .to(Contracts::Table, Contracts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_contract_categories_category_id")
                                .from(ContractCategories::Table, ContractCategories::CategoryId)
                                .to(ProductCategories::Table, ProductCategories::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Jobs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Jobs::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Jobs::JobType).string_len(4).not_null())
                        .col(
                            ColumnDef::new(Jobs::JobNumber)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Jobs::CustomerId).big_integer().not_null())
                        .col(ColumnDef::new(Jobs::Rig).string_len(100).not_null())
                        .col(ColumnDef::new(Jobs::Location).string_len(200).not_null())
                        .col(ColumnDef::new(Jobs::Well).string_len(100).not_null())
                        .col(ColumnDef::new(Jobs::Trans).string_len(100).null())
                        .col(ColumnDef::new(Jobs::Date).date().not_null())
                        .col(ColumnDef::new(Jobs::Description).text().null())
                        .col(
                            ColumnDef::new(Jobs::Status)
                                .string_len(10)
                                .not_null()
                                .default("open"),
                        )
                        .col(
                            ColumnDef::new(Jobs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_jobs_customer_id")
                                .from(Jobs::Table, Jobs::CustomerId)
                                .to(Customers::Table, Customers::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_jobs_status")
                        .table(Jobs::Table)
                        .col(Jobs::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Jobs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ContractCategories::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Contracts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Customers {
        Table,
        Id,
        Name,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Contracts {
        Table,
        Id,
        CustomerId,
        StartDate,
        EndDate,
    }

    #[derive(DeriveIden)]
    enum ContractCategories {
        Table,
        ContractId,
        CategoryId,
    }

    #[derive(DeriveIden)]
    pub enum Jobs {
        Table,
        Id,
        JobType,
        JobNumber,
        CustomerId,
        Rig,
        Location,
        Well,
        Trans,
        Date,
        Description,
        Status,
        CreatedAt,
    }
}

mod m20250101_000003_create_ticket_tables {

    use super::m20250101_000001_create_inventory_tables::InventoryItems;
    use super::m20250101_000002_create_job_tables::Jobs;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_ticket_tables"
        }
    }

    /// Both ticket headers share a layout; only the table name differs.
    fn ticket_table(table: TicketTable) -> TableCreateStatement {
        let name = match table {
            TicketTable::Delivery => "delivery_tickets",
            TicketTable::Receiving => "receiving_tickets",
        };
        Table::create()
            .table(Alias::new(name))
            .if_not_exists()
            .col(
                ColumnDef::new(Tickets::Id)
                    .big_integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(Tickets::JobId).big_integer().not_null())
            .col(ColumnDef::new(Tickets::TicketNumber).string_len(100).not_null())
            .col(
                ColumnDef::new(Tickets::TicketDate)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(ColumnDef::new(Tickets::CreatedBy).string_len(150).null())
            .foreign_key(
                ForeignKey::create()
                    .name(format!("fk_{}_job_id", name))
                    .from(Alias::new(name), Tickets::JobId)
                    .to(Jobs::Table, Jobs::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned()
    }

    fn ticket_number_index(table: TicketTable) -> IndexCreateStatement {
        let name = match table {
            TicketTable::Delivery => "delivery_tickets",
            TicketTable::Receiving => "receiving_tickets",
        };
        Index::create()
            .if_not_exists()
            .name(format!("uq_{}_job_ticket_number", name))
            .table(Alias::new(name))
            .col(Tickets::JobId)
            .col(Tickets::TicketNumber)
            .unique()
            .to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [TicketTable::Delivery, TicketTable::Receiving] {
                manager.create_table(ticket_table(table)).await?;
                manager.create_index(ticket_number_index(table)).await?;
            }

            manager
                .create_table(
                    Table::create()
                        .table(DeliveryTicketItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryTicketItems::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTicketItems::TicketId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTicketItems::ItemId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTicketItems::IsReturnable)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(DeliveryTicketItems::DeliveredAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_ticket_items_ticket_id")
                                .from(DeliveryTicketItems::Table, DeliveryTicketItems::TicketId)
                                .to(Alias::new("delivery_tickets"), Tickets::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_ticket_items_item_id")
                                .from(DeliveryTicketItems::Table, DeliveryTicketItems::ItemId)
                                .to(InventoryItems::Table, InventoryItems::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReceivingTicketItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReceivingTicketItems::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ReceivingTicketItems::TicketId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReceivingTicketItems::ItemId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReceivingTicketItems::ReceivedStatus)
                                .string_len(32)
                                .not_null()
                                .default("available"),
                        )
                        .col(
                            ColumnDef::new(ReceivingTicketItems::ReceivedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receiving_ticket_items_ticket_id")
                                .from(ReceivingTicketItems::Table, ReceivingTicketItems::TicketId)
                                .to(Alias::new("receiving_tickets"), Tickets::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receiving_ticket_items_item_id")
                                .from(ReceivingTicketItems::Table, ReceivingTicketItems::ItemId)
                                .to(InventoryItems::Table, InventoryItems::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_delivery_ticket_items_item_id")
                        .table(DeliveryTicketItems::Table)
                        .col(DeliveryTicketItems::ItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receiving_ticket_items_item_id")
                        .table(ReceivingTicketItems::Table)
                        .col(ReceivingTicketItems::ItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReceivingTicketItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DeliveryTicketItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Alias::new("receiving_tickets")).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Alias::new("delivery_tickets")).to_owned())
                .await
        }
    }

    #[derive(Clone, Copy)]
    enum TicketTable {
        Delivery,
        Receiving,
    }

    #[derive(DeriveIden)]
    enum Tickets {
        Id,
        JobId,
        TicketNumber,
        TicketDate,
        CreatedBy,
    }

    #[derive(DeriveIden)]
    enum DeliveryTicketItems {
        Table,
        Id,
        TicketId,
        ItemId,
        IsReturnable,
        DeliveredAt,
    }

    #[derive(DeriveIden)]
    enum ReceivingTicketItems {
        Table,
        Id,
        TicketId,
        ItemId,
        ReceivedStatus,
        ReceivedAt,
    }
}

mod m20250101_000004_create_id_sequences_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_id_sequences_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(IdSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(IdSequences::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(IdSequences::Scope).string_len(20).not_null())
                        .col(ColumnDef::new(IdSequences::ScopeKey).string_len(50).not_null())
                        .col(
                            ColumnDef::new(IdSequences::LastValue)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_id_sequences_scope_key")
                        .table(IdSequences::Table)
                        .col(IdSequences::Scope)
                        .col(IdSequences::ScopeKey)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(IdSequences::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum IdSequences {
        Table,
        Id,
        Scope,
        ScopeKey,
        LastValue,
    }
}
