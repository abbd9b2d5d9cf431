//! Yardline
//!
//! Inventory lifecycle core for an oilfield equipment yard: items move between
//! the yard and customer jobs on delivery and receiving tickets, and the
//! ticket ledger decides which items are still out on each job.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod services;

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::services::factory::{ServiceContainer, ServiceFactory};

/// Capacity of the domain event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: ServiceContainer,
}

impl AppState {
    /// Wires every service to the pool and spawns the event logger.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(db: db::DbPool, config: config::AppConfig) -> Self {
        let db = Arc::new(db);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let event_sender = Arc::new(events::EventSender::new(event_tx));
        tokio::spawn(events::process_events(event_rx));

        let factory = ServiceFactory::new(db.clone(), event_sender.clone()).with_config(&config);
        let services = ServiceContainer::new(&factory);

        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}
