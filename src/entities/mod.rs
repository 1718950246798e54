pub mod inventory_log;
pub mod product_variant;
pub mod sale;
pub mod sale_item;
pub mod stock_lot;

pub use inventory_log::LogEntryType;
