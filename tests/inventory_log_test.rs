mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use stockbook::entities::{stock_lot, LogEntryType};
use stockbook::errors::ServiceError;
use stockbook::repositories;
use stockbook::services::inventory_log::{InventoryLogService, LogFilter, ManualLogRequest};
use uuid::Uuid;

use common::{at, seed_lot, seed_variant, setup_db};

fn manual(stock_lot_id: Uuid, entry_type: LogEntryType, delta: i32) -> ManualLogRequest {
    ManualLogRequest {
        stock_lot_id,
        entry_type,
        quantity_change: delta,
        source_id: None,
        source_type: None,
        note: None,
    }
}

#[tokio::test]
async fn manual_return_increases_lot_and_journals_it() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-1").await;
    let lot = seed_lot(&db, variant.id, 10, dec!(1.00), None, at(2024, 1, 1)).await;

    let service = InventoryLogService::new(db.clone(), None);
    let entry = service
        .create_manual_log(company, None, manual(lot.id, LogEntryType::Return, 4))
        .await
        .unwrap();

    assert_eq!(entry.entry_type, "RETURN");
    assert_eq!(entry.quantity_change, 4);
    assert_eq!(entry.previous_quantity, 10);
    assert_eq!(entry.new_quantity, 14);
    assert!(entry.is_manual);
    assert!(!entry.is_reverted);

    let lot_after = stock_lot::Entity::find_by_id(lot.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lot_after.quantity, 14);
}

#[tokio::test]
async fn manual_loss_decreases_lot() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-2").await;
    let lot = seed_lot(&db, variant.id, 10, dec!(1.00), None, at(2024, 1, 1)).await;

    let service = InventoryLogService::new(db.clone(), None);
    let entry = service
        .create_manual_log(company, None, manual(lot.id, LogEntryType::Loss, -3))
        .await
        .unwrap();

    assert_eq!(entry.previous_quantity, 10);
    assert_eq!(entry.new_quantity, 7);

    let lot_after = stock_lot::Entity::find_by_id(lot.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lot_after.quantity, 7);
}

#[tokio::test]
async fn adjustment_below_zero_is_rejected_without_mutation() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-3").await;
    let lot = seed_lot(&db, variant.id, 5, dec!(1.00), None, at(2024, 1, 1)).await;

    let service = InventoryLogService::new(db.clone(), None);
    let err = service
        .create_manual_log(company, None, manual(lot.id, LogEntryType::Loss, -8))
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ServiceError::NegativeQuantity {
            stock_lot_id,
            resulting: -3,
        } if stock_lot_id == lot.id
    );

    let lot_after = stock_lot::Entity::find_by_id(lot.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lot_after.quantity, 5);
    let logs = repositories::inventory_logs::active_entries_for_lot(db.as_ref(), company, lot.id)
        .await
        .unwrap();
    assert!(logs.is_empty());
}

#[tokio::test]
async fn zero_delta_is_rejected() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let service = InventoryLogService::new(db.clone(), None);
    let err = service
        .create_manual_log(
            company,
            None,
            manual(Uuid::new_v4(), LogEntryType::Adjustment, 0),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn revert_restores_the_lot_exactly() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-4").await;
    let lot = seed_lot(&db, variant.id, 20, dec!(1.00), None, at(2024, 1, 1)).await;

    let service = InventoryLogService::new(db.clone(), None);
    let entry = service
        .create_manual_log(company, None, manual(lot.id, LogEntryType::Loss, -6))
        .await
        .unwrap();

    let reverted = service.revert_log(company, entry.id, admin).await.unwrap();
    assert!(reverted.is_reverted);
    assert_eq!(reverted.reverted_by_id, Some(admin));
    // The original journal values stay frozen on the entry.
    assert_eq!(reverted.quantity_change, -6);
    assert_eq!(reverted.previous_quantity, 20);
    assert_eq!(reverted.new_quantity, 14);

    let lot_after = stock_lot::Entity::find_by_id(lot.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lot_after.quantity, 20);
}

#[tokio::test]
async fn second_revert_of_the_same_entry_fails() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-5").await;
    let lot = seed_lot(&db, variant.id, 20, dec!(1.00), None, at(2024, 1, 1)).await;

    let service = InventoryLogService::new(db.clone(), None);
    let entry = service
        .create_manual_log(company, None, manual(lot.id, LogEntryType::Loss, -6))
        .await
        .unwrap();

    service.revert_log(company, entry.id, admin).await.unwrap();
    let err = service.revert_log(company, entry.id, admin).await.unwrap_err();
    assert_matches!(err, ServiceError::AlreadyReverted { log_id } if log_id == entry.id);

    // The lot was not touched by the failed second attempt.
    let lot_after = stock_lot::Entity::find_by_id(lot.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lot_after.quantity, 20);
}

#[tokio::test]
async fn revert_that_would_go_negative_is_rejected() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-6").await;
    let lot = seed_lot(&db, variant.id, 10, dec!(1.00), None, at(2024, 1, 1)).await;

    let service = InventoryLogService::new(db.clone(), None);
    // +8 then -15: reverting the +8 would leave 3 - 8 = -5.
    let addition = service
        .create_manual_log(company, None, manual(lot.id, LogEntryType::Return, 8))
        .await
        .unwrap();
    service
        .create_manual_log(company, None, manual(lot.id, LogEntryType::Loss, -15))
        .await
        .unwrap();

    let err = service.revert_log(company, addition.id, admin).await.unwrap_err();
    assert_matches!(
        err,
        ServiceError::NegativeQuantity {
            stock_lot_id,
            resulting: -5,
        } if stock_lot_id == lot.id
    );

    let lot_after = stock_lot::Entity::find_by_id(lot.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lot_after.quantity, 3);
}

#[tokio::test]
async fn active_entries_reconstruct_the_current_quantity() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-7").await;
    let lot = seed_lot(&db, variant.id, 50, dec!(1.00), None, at(2024, 1, 1)).await;

    let service = InventoryLogService::new(db.clone(), None);
    service
        .create_manual_log(company, None, manual(lot.id, LogEntryType::Loss, -10))
        .await
        .unwrap();
    let returned = service
        .create_manual_log(company, None, manual(lot.id, LogEntryType::Return, 5))
        .await
        .unwrap();
    service
        .create_manual_log(company, None, manual(lot.id, LogEntryType::Adjustment, -2))
        .await
        .unwrap();
    // Reverting the return removes it from the active set.
    service.revert_log(company, returned.id, admin).await.unwrap();

    let lot_after = stock_lot::Entity::find_by_id(lot.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lot_after.quantity, 38); // 50 - 10 - 2

    let active = repositories::inventory_logs::active_entries_for_lot(db.as_ref(), company, lot.id)
        .await
        .unwrap();
    let replayed: i32 = 50 + active.iter().map(|e| e.quantity_change).sum::<i32>();
    assert_eq!(replayed, lot_after.quantity);
}

#[tokio::test]
async fn list_logs_filters_by_lot_and_type_and_paginates() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-8").await;
    let lot_a = seed_lot(&db, variant.id, 100, dec!(1.00), None, at(2024, 1, 1)).await;
    let lot_b = seed_lot(&db, variant.id, 100, dec!(1.00), None, at(2024, 1, 2)).await;

    let service = InventoryLogService::new(db.clone(), None);
    for _ in 0..3 {
        service
            .create_manual_log(company, None, manual(lot_a.id, LogEntryType::Loss, -1))
            .await
            .unwrap();
    }
    service
        .create_manual_log(company, None, manual(lot_b.id, LogEntryType::Return, 2))
        .await
        .unwrap();

    let by_lot = service
        .list_logs(
            company,
            LogFilter {
                stock_lot_id: Some(lot_a.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_lot.total, 3);
    assert!(by_lot.entries.iter().all(|e| e.stock_lot_id == lot_a.id));

    let by_type = service
        .list_logs(
            company,
            LogFilter {
                entry_type: Some(LogEntryType::Return),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_type.total, 1);
    assert_eq!(by_type.entries[0].stock_lot_id, lot_b.id);

    let first_page = service
        .list_logs(
            company,
            LogFilter {
                page: 1,
                per_page: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(first_page.total, 4);
    assert_eq!(first_page.entries.len(), 2);

    let second_page = service
        .list_logs(
            company,
            LogFilter {
                page: 2,
                per_page: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(second_page.entries.len(), 2);
}

#[tokio::test]
async fn exhausted_budget_times_out_and_rolls_back() {
    let db = setup_db().await;
    let company = Uuid::new_v4();
    let variant = seed_variant(&db, company, "SKU-9").await;
    let lot = seed_lot(&db, variant.id, 10, dec!(1.00), None, at(2024, 1, 1)).await;

    let service = InventoryLogService::new(db.clone(), None)
        .with_transaction_budget(std::time::Duration::from_nanos(1));
    let err = service
        .create_manual_log(company, None, manual(lot.id, LogEntryType::Loss, -3))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::TransactionTimeout(_));

    let lot_after = stock_lot::Entity::find_by_id(lot.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lot_after.quantity, 10);
    let logs = repositories::inventory_logs::active_entries_for_lot(db.as_ref(), company, lot.id)
        .await
        .unwrap();
    assert!(logs.is_empty());
}

#[tokio::test]
async fn unknown_lot_is_not_found() {
    let db = setup_db().await;
    let company = Uuid::new_v4();

    let service = InventoryLogService::new(db.clone(), None);
    let err = service
        .create_manual_log(
            company,
            None,
            manual(Uuid::new_v4(), LogEntryType::Adjustment, 1),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
