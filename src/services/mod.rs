// Core services
pub mod allocation;
pub mod inventory_log;
pub mod sales;
pub mod stock;
