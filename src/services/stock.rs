use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{inventory_log, stock_lot, LogEntryType},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories,
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ReceiveStockRequest {
    pub product_variant_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub expiration_date: Option<NaiveDate>,
    /// Defaults to now when unspecified.
    pub entry_date: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StockLotResponse {
    pub id: Uuid,
    pub product_variant_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub entry_date: DateTime<Utc>,
    pub expiration_date: Option<NaiveDate>,
    pub is_active: bool,
}

/// Inbound stock: creates a lot and its ENTRY journal row in one
/// transaction, plus the tenant-scoped lot read path.
#[derive(Clone)]
pub struct StockService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl StockService {
    /// Creates a new stock service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Registers received stock as a new lot. The lot's first journal
    /// entry (type ENTRY, 0 -> quantity) is written atomically with it.
    #[instrument(skip(self, request), fields(company_id = %company_id, variant_id = %request.product_variant_id, quantity = request.quantity))]
    pub async fn receive_stock(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        request: ReceiveStockRequest,
    ) -> Result<StockLotResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for stock receipt");
            ServiceError::DatabaseError(e)
        })?;

        let variant =
            repositories::variants::find_scoped(&txn, company_id, request.product_variant_id)
                .await
                .map_err(ServiceError::DatabaseError)?;
        if variant.is_none() {
            let _ = txn.rollback().await;
            return Err(ServiceError::NotFound(format!(
                "Product variant {} not found",
                request.product_variant_id
            )));
        }

        let now = Utc::now();
        let lot_id = Uuid::new_v4();
        let lot_result = stock_lot::ActiveModel {
            id: Set(lot_id),
            product_variant_id: Set(request.product_variant_id),
            quantity: Set(request.quantity),
            unit_cost: Set(request.unit_cost),
            entry_date: Set(request.entry_date.unwrap_or(now)),
            expiration_date: Set(request.expiration_date),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await;

        let lot = match lot_result {
            Ok(lot) => lot,
            Err(e) => {
                let _ = txn.rollback().await;
                return Err(ServiceError::DatabaseError(e));
            }
        };

        let log_result = inventory_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            stock_lot_id: Set(lot_id),
            company_id: Set(company_id),
            r#type: Set(LogEntryType::Entry.as_str().to_string()),
            quantity_change: Set(request.quantity),
            previous_quantity: Set(0),
            new_quantity: Set(request.quantity),
            is_manual: Set(false),
            is_reverted: Set(false),
            source_id: Set(None),
            source_type: Set(Some("STOCK_ENTRY".to_string())),
            note: Set(request.note.clone()),
            user_id: Set(user_id),
            reverted_by_id: Set(None),
            created_at: Set(now),
        }
        .insert(&txn)
        .await;

        if let Err(e) = log_result {
            let _ = txn.rollback().await;
            return Err(ServiceError::DatabaseError(e));
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit stock receipt");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            stock_lot_id = %lot.id,
            quantity = lot.quantity,
            "Stock lot received"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::StockReceived {
                    stock_lot_id: lot.id,
                    product_variant_id: lot.product_variant_id,
                    quantity: lot.quantity,
                })
                .await
            {
                warn!(error = %e, stock_lot_id = %lot.id, "Failed to send stock received event");
            }
        }

        Ok(Self::to_response(lot))
    }

    /// Lists the tenant's lots, optionally narrowed to one variant, in
    /// allocation order.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn list_lots(
        &self,
        company_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<Vec<StockLotResponse>, ServiceError> {
        let db = &*self.db_pool;
        let lots = repositories::stock_lots::list_scoped(db, company_id, variant_id)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(lots.into_iter().map(Self::to_response).collect())
    }

    fn to_response(lot: stock_lot::Model) -> StockLotResponse {
        StockLotResponse {
            id: lot.id,
            product_variant_id: lot.product_variant_id,
            quantity: lot.quantity,
            unit_cost: lot.unit_cost,
            entry_date: lot.entry_date,
            expiration_date: lot.expiration_date,
            is_active: lot.is_active,
        }
    }
}
