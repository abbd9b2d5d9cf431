#![allow(dead_code)]

use chrono::NaiveDate;
use sea_orm::EntityTrait;
use yardline::{
    config::AppConfig,
    db,
    entities::{
        customer, inventory_item, job, product_category, ItemStatus, JobType, YardLocation,
    },
    services::{inventory::NewItem, jobs::NewJob},
    AppState,
};

/// Helper harness for spinning up the services against an in-memory SQLite database.
pub struct TestApp {
    pub state: AppState,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_config(AppConfig::new(
            "sqlite::memory:".to_string(),
            "test".to_string(),
        ))
        .await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        Self {
            state: AppState::new(pool, cfg),
        }
    }

    pub fn db(&self) -> &db::DbPool {
        self.state.db.as_ref()
    }

    pub async fn customer(&self, name: &str) -> customer::Model {
        self.state
            .services
            .jobs
            .create_customer(name)
            .await
            .expect("create customer")
    }

    pub async fn category(&self, name: &str, unit: Option<&str>) -> product_category::Model {
        self.state
            .services
            .inventory
            .create_category(name, unit)
            .await
            .expect("create category")
    }

    /// An available item in the Maadi yard.
    pub async fn item(&self, serial: &str, category_id: i64) -> inventory_item::Model {
        self.item_with(serial, category_id, YardLocation::MaadiYard, ItemStatus::Available)
            .await
    }

    pub async fn item_with(
        &self,
        serial: &str,
        category_id: i64,
        location: YardLocation,
        status: ItemStatus,
    ) -> inventory_item::Model {
        self.state
            .services
            .inventory
            .add_item(NewItem {
                serial_number: serial.to_string(),
                category_id,
                location,
                status,
            })
            .await
            .expect("add item")
    }

    pub async fn job(&self, customer_id: i64, job_type: JobType) -> job::Model {
        self.state
            .services
            .jobs
            .create_job(NewJob {
                job_type,
                customer_id,
                rig: "EDC-54".to_string(),
                location: "Western Desert".to_string(),
                well: "Badr-3".to_string(),
                trans: None,
                date: NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date"),
                description: None,
            })
            .await
            .expect("create job")
    }

    pub async fn status_of(&self, item_id: i64) -> ItemStatus {
        inventory_item::Entity::find_by_id(item_id)
            .one(self.db())
            .await
            .expect("load item")
            .expect("item exists")
            .status
    }

    pub async fn job_row(&self, job_id: i64) -> job::Model {
        job::Entity::find_by_id(job_id)
            .one(self.db())
            .await
            .expect("load job")
            .expect("job exists")
    }
}

/// A customer, a "Drill Pipe" category and an open fishing job, the usual
/// starting point for ledger tests.
pub struct Yard {
    pub app: TestApp,
    pub customer: customer::Model,
    pub drill_pipe: product_category::Model,
    pub job: job::Model,
}

impl Yard {
    pub async fn new() -> Self {
        let app = TestApp::new().await;
        let customer = app.customer("Acme").await;
        let drill_pipe = app.category("Drill Pipe", Some("joint")).await;
        let job = app.job(customer.id, JobType::Fishing).await;
        Self {
            app,
            customer,
            drill_pipe,
            job,
        }
    }

    pub async fn items(&self, serials: &[&str]) -> Vec<inventory_item::Model> {
        let mut items = Vec::with_capacity(serials.len());
        for serial in serials {
            items.push(self.app.item(serial, self.drill_pipe.id).await);
        }
        items
    }
}
