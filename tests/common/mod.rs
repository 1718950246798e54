#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use std::sync::Arc;
use stockbook::db::{establish_connection_with_config, run_migrations, DbConfig, DbPool};
use stockbook::entities::{product_variant, stock_lot};
use uuid::Uuid;

/// Fresh in-memory database with the schema applied. A single connection
/// keeps every query on the same sqlite memory instance.
pub async fn setup_db() -> Arc<DbPool> {
    let config = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let db = establish_connection_with_config(&config)
        .await
        .expect("Failed to create in-memory database");
    run_migrations(&db).await.expect("Failed to run migrations");
    Arc::new(db)
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

pub async fn seed_variant(db: &DbPool, company_id: Uuid, sku: &str) -> product_variant::Model {
    product_variant::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(company_id),
        sku: Set(sku.to_string()),
        name: Set(format!("Variant {}", sku)),
        is_active: Set(true),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("Failed to seed product variant")
}

pub async fn seed_lot(
    db: &DbPool,
    variant_id: Uuid,
    quantity: i32,
    unit_cost: Decimal,
    expiration_date: Option<NaiveDate>,
    entry_date: DateTime<Utc>,
) -> stock_lot::Model {
    stock_lot::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_variant_id: Set(variant_id),
        quantity: Set(quantity),
        unit_cost: Set(unit_cost),
        entry_date: Set(entry_date),
        expiration_date: Set(expiration_date),
        is_active: Set(true),
        created_at: Set(entry_date),
        updated_at: Set(entry_date),
    }
    .insert(db)
    .await
    .expect("Failed to seed stock lot")
}
