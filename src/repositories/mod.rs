//! Tenant-scoped query layer.
//!
//! Every function here takes the tenant (`company_id`) as a mandatory
//! parameter and threads it into the generated query; there is no bypass
//! path. Functions are generic over [`sea_orm::ConnectionTrait`] so the
//! same query runs against the pool or against an open transaction handle.

pub mod inventory_logs;
pub mod stock_lots;
pub mod variants;
