//! Stockbook core library
//!
//! Multi-tenant inventory and sales ledger: FIFO stock allocation,
//! transactional sale orchestration, and a reversible audit trail with
//! strict non-negative-inventory guarantees. The surrounding API layer
//! (routing, auth, documentation) consumes the services exposed here.
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
pub mod logging;
pub mod migrator;
pub mod repositories;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub use errors::ServiceError;

/// Bundles the configured services over one connection pool, ready for an
/// API layer to consume.
#[derive(Clone)]
pub struct CoreState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub sales: services::sales::SaleService,
    pub inventory_logs: services::inventory_log::InventoryLogService,
    pub stock: services::stock::StockService,
}

impl CoreState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let budget = std::time::Duration::from_secs(config.transaction_budget_secs);
        let sender = Arc::new(event_sender.clone());
        Self {
            sales: services::sales::SaleService::new(db.clone(), Some(sender.clone()))
                .with_transaction_budget(budget),
            inventory_logs: services::inventory_log::InventoryLogService::new(
                db.clone(),
                Some(sender.clone()),
            )
            .with_transaction_budget(budget),
            stock: services::stock::StockService::new(db.clone(), Some(sender)),
            db,
            config,
            event_sender,
        }
    }
}
