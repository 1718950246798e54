mod common;

use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use stockbook::entities::stock_lot;
use stockbook::repositories::stock_lots::{apply_delta, decrement_quantity};
use uuid::Uuid;

use common::{at, seed_lot, seed_variant, setup_db};

// The conditional updates are the last line of defense against lost
// updates: a concurrent commit between a caller's snapshot read and its
// write must make the guarded statement match zero rows, never drive a
// lot negative.

#[tokio::test]
async fn overdraw_decrement_matches_no_row_and_leaves_quantity() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-1").await;
    let lot = seed_lot(&db, variant.id, 5, dec!(1.00), None, at(2024, 1, 1)).await;

    let decremented = decrement_quantity(db.as_ref(), lot.id, 6).await.unwrap();
    assert!(!decremented);

    let after = stock_lot::Entity::find_by_id(lot.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.quantity, 5);
}

#[tokio::test]
async fn exact_decrement_succeeds_and_drains_the_lot() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-2").await;
    let lot = seed_lot(&db, variant.id, 5, dec!(1.00), None, at(2024, 1, 1)).await;

    assert!(decrement_quantity(db.as_ref(), lot.id, 5).await.unwrap());

    let after = stock_lot::Entity::find_by_id(lot.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.quantity, 0);

    // The drained lot has no headroom left for a further decrement.
    assert!(!decrement_quantity(db.as_ref(), lot.id, 1).await.unwrap());
}

#[tokio::test]
async fn negative_delta_beyond_headroom_matches_no_row() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-3").await;
    let lot = seed_lot(&db, variant.id, 3, dec!(1.00), None, at(2024, 1, 1)).await;

    let applied = apply_delta(db.as_ref(), lot.id, -4).await.unwrap();
    assert!(!applied);

    let after = stock_lot::Entity::find_by_id(lot.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.quantity, 3);

    // Draining to exactly zero is allowed, and a positive delta needs no
    // guard at all.
    assert!(apply_delta(db.as_ref(), lot.id, -3).await.unwrap());
    assert!(apply_delta(db.as_ref(), lot.id, 7).await.unwrap());

    let after = stock_lot::Entity::find_by_id(lot.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.quantity, 7);
}

#[tokio::test]
async fn guard_against_missing_lot_matches_no_row() {
    let db = setup_db().await;

    assert!(!decrement_quantity(db.as_ref(), Uuid::new_v4(), 1).await.unwrap());
    assert!(!apply_delta(db.as_ref(), Uuid::new_v4(), -1).await.unwrap());
}
