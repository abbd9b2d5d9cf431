use std::sync::Arc;

use crate::{
    config::{AppConfig, ImportConfig},
    db::DbPool,
    events::EventSender,
    services::{
        contracts::ContractService, import::ImportService, inventory::InventoryService,
        jobs::JobService, reconciliation::ReconciliationService, tickets::TicketService,
    },
};

/// Factory for creating service instances with shared dependencies
pub struct ServiceFactory {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    import: ImportConfig,
    search_result_limit: u64,
}

impl ServiceFactory {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
            import: ImportConfig::default(),
            search_result_limit: 20,
        }
    }

    /// Takes the import limits and search cap from the application config.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.import = config.import.clone();
        self.search_result_limit = config.search_result_limit;
        self
    }

    pub fn inventory_service(&self) -> InventoryService {
        InventoryService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn import_service(&self) -> ImportService {
        ImportService::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.import.clone(),
        )
    }

    pub fn ticket_service(&self) -> TicketService {
        TicketService::new(self.db_pool.clone(), self.event_sender.clone())
            .with_search_limit(self.search_result_limit)
    }

    pub fn reconciliation_service(&self) -> ReconciliationService {
        ReconciliationService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn job_service(&self) -> JobService {
        JobService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn contract_service(&self) -> ContractService {
        ContractService::new(self.db_pool.clone())
    }

    /// Gets a reference to the database pool
    pub fn db_pool(&self) -> &Arc<DbPool> {
        &self.db_pool
    }
}

/// Service container holding all service instances
#[derive(Clone)]
pub struct ServiceContainer {
    pub inventory: Arc<InventoryService>,
    pub import: Arc<ImportService>,
    pub tickets: Arc<TicketService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub jobs: Arc<JobService>,
    pub contracts: Arc<ContractService>,
}

impl ServiceContainer {
    /// Creates a new service container with all services initialized
    pub fn new(factory: &ServiceFactory) -> Self {
        Self {
            inventory: Arc::new(factory.inventory_service()),
            import: Arc::new(factory.import_service()),
            tickets: Arc::new(factory.ticket_service()),
            reconciliation: Arc::new(factory.reconciliation_service()),
            jobs: Arc::new(factory.job_service()),
            contracts: Arc::new(factory.contract_service()),
        }
    }
}
