// Yard lifecycle core
pub mod contracts;
pub mod import;
pub mod inventory;
pub mod jobs;
pub mod numbering;
pub mod reconciliation;
pub mod tickets;

// Service factory for dependency injection
pub mod factory;
