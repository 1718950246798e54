mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use stockbook::entities::inventory_log;
use stockbook::errors::ServiceError;
use stockbook::services::stock::{ReceiveStockRequest, StockService};
use uuid::Uuid;

use common::{at, day, seed_variant, setup_db};

#[tokio::test]
async fn receiving_stock_creates_lot_and_entry_journal_row() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let user = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-1").await;

    let service = StockService::new(db.clone(), None);
    let lot = service
        .receive_stock(
            company,
            Some(user),
            ReceiveStockRequest {
                product_variant_id: variant.id,
                quantity: 100,
                unit_cost: dec!(2.50),
                expiration_date: Some(day(2025, 6, 1)),
                entry_date: Some(at(2024, 1, 10)),
                note: Some("delivery #4411".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(lot.quantity, 100);
    assert_eq!(lot.unit_cost, dec!(2.50));
    assert_eq!(lot.expiration_date, Some(day(2025, 6, 1)));
    assert!(lot.is_active);

    let log = inventory_log::Entity::find()
        .filter(inventory_log::Column::StockLotId.eq(lot.id))
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.r#type, "ENTRY");
    assert_eq!(log.quantity_change, 100);
    assert_eq!(log.previous_quantity, 0);
    assert_eq!(log.new_quantity, 100);
    assert!(!log.is_manual);
    assert_eq!(log.user_id, Some(user));
    assert_eq!(log.note.as_deref(), Some("delivery #4411"));
    assert_eq!(log.company_id, company);
}

#[tokio::test]
async fn receiving_against_an_unknown_variant_fails() {
    let db = setup_db().await;
    let company = Uuid::new_v4();

    let service = StockService::new(db.clone(), None);
    let err = service
        .receive_stock(
            company,
            None,
            ReceiveStockRequest {
                product_variant_id: Uuid::new_v4(),
                quantity: 10,
                unit_cost: dec!(1.00),
                expiration_date: None,
                entry_date: None,
                note: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn receiving_for_another_tenants_variant_fails() {
    let db = setup_db().await;
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();
    let variant = seed_variant(&db, owner, "SKU-2").await;

    let service = StockService::new(db.clone(), None);
    let err = service
        .receive_stock(
            intruder,
            None,
            ReceiveStockRequest {
                product_variant_id: variant.id,
                quantity: 10,
                unit_cost: dec!(1.00),
                expiration_date: None,
                entry_date: None,
                note: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn received_lots_list_in_allocation_order() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-3").await;

    let service = StockService::new(db.clone(), None);
    let later = service
        .receive_stock(
            company,
            None,
            ReceiveStockRequest {
                product_variant_id: variant.id,
                quantity: 10,
                unit_cost: dec!(1.00),
                expiration_date: Some(day(2025, 9, 1)),
                entry_date: Some(at(2024, 2, 1)),
                note: None,
            },
        )
        .await
        .unwrap();
    let sooner = service
        .receive_stock(
            company,
            None,
            ReceiveStockRequest {
                product_variant_id: variant.id,
                quantity: 10,
                unit_cost: dec!(1.00),
                expiration_date: Some(day(2025, 3, 1)),
                entry_date: Some(at(2024, 2, 2)),
                note: None,
            },
        )
        .await
        .unwrap();
    let undated = service
        .receive_stock(
            company,
            None,
            ReceiveStockRequest {
                product_variant_id: variant.id,
                quantity: 10,
                unit_cost: dec!(1.00),
                expiration_date: None,
                entry_date: Some(at(2024, 1, 1)),
                note: None,
            },
        )
        .await
        .unwrap();

    let lots = service.list_lots(company, Some(variant.id)).await.unwrap();
    let ids: Vec<Uuid> = lots.iter().map(|l| l.id).collect();
    // Soonest expiration first; lots without one come last.
    assert_eq!(ids, vec![sooner.id, later.id, undated.id]);
}
