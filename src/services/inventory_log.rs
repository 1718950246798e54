use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{inventory_log, LogEntryType},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories,
};

const DEFAULT_TRANSACTION_BUDGET: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize, Deserialize)]
pub struct ManualLogRequest {
    pub stock_lot_id: Uuid,
    pub entry_type: LogEntryType,
    /// Signed delta: positive for entries/returns, negative for losses and
    /// downward corrections.
    pub quantity_change: i32,
    pub source_id: Option<Uuid>,
    pub source_type: Option<String>,
    pub note: Option<String>,
}

/// Filters for the journal read path.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogFilter {
    pub stock_lot_id: Option<Uuid>,
    pub entry_type: Option<LogEntryType>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            stock_lot_id: None,
            entry_type: None,
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogEntryResponse {
    pub id: Uuid,
    pub stock_lot_id: Uuid,
    pub company_id: Uuid,
    pub entry_type: String,
    pub quantity_change: i32,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub is_manual: bool,
    pub is_reverted: bool,
    pub source_id: Option<Uuid>,
    pub source_type: Option<String>,
    pub note: Option<String>,
    pub user_id: Option<Uuid>,
    pub reverted_by_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogListResponse {
    pub entries: Vec<LogEntryResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Manual adjustments and single-use reversals over the inventory journal.
#[derive(Clone)]
pub struct InventoryLogService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    transaction_budget: Duration,
}

impl InventoryLogService {
    /// Creates a new inventory log service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
            transaction_budget: DEFAULT_TRANSACTION_BUDGET,
        }
    }

    /// Overrides the wall-clock budget for one adjustment transaction.
    pub fn with_transaction_budget(mut self, budget: Duration) -> Self {
        self.transaction_budget = budget;
        self
    }

    /// Applies an ad-hoc quantity delta to a lot and journals it.
    /// The resulting quantity must stay non-negative; otherwise nothing is
    /// mutated.
    #[instrument(skip(self, request), fields(company_id = %company_id, stock_lot_id = %request.stock_lot_id, delta = request.quantity_change))]
    pub async fn create_manual_log(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        request: ManualLogRequest,
    ) -> Result<LogEntryResponse, ServiceError> {
        if request.quantity_change == 0 {
            return Err(ServiceError::ValidationError(
                "quantity change must not be zero".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for manual adjustment");
            ServiceError::DatabaseError(e)
        })?;

        let outcome = tokio::time::timeout(
            self.transaction_budget,
            self.execute_manual(&txn, company_id, user_id, &request),
        )
        .await;

        let entry = match outcome {
            Err(_elapsed) => {
                let _ = txn.rollback().await;
                return Err(ServiceError::TransactionTimeout(
                    self.transaction_budget.as_secs(),
                ));
            }
            Ok(Err(e)) => {
                let _ = txn.rollback().await;
                return Err(e);
            }
            Ok(Ok(entry)) => {
                txn.commit().await.map_err(|e| {
                    error!(error = %e, "Failed to commit manual adjustment");
                    ServiceError::DatabaseError(e)
                })?;
                entry
            }
        };

        info!(
            log_id = %entry.id,
            stock_lot_id = %entry.stock_lot_id,
            previous = entry.previous_quantity,
            new = entry.new_quantity,
            "Manual inventory adjustment recorded"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::InventoryAdjusted {
                    stock_lot_id: entry.stock_lot_id,
                    log_id: entry.id,
                    previous_quantity: entry.previous_quantity,
                    new_quantity: entry.new_quantity,
                })
                .await
            {
                warn!(error = %e, log_id = %entry.id, "Failed to send inventory adjusted event");
            }
        }

        Ok(Self::to_response(entry))
    }

    async fn execute_manual(
        &self,
        txn: &DatabaseTransaction,
        company_id: Uuid,
        user_id: Option<Uuid>,
        request: &ManualLogRequest,
    ) -> Result<inventory_log::Model, ServiceError> {
        let lot = repositories::stock_lots::find_scoped(txn, company_id, request.stock_lot_id)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Stock lot {} not found", request.stock_lot_id))
            })?;

        let resulting = lot.quantity + request.quantity_change;
        if resulting < 0 {
            return Err(ServiceError::NegativeQuantity {
                stock_lot_id: lot.id,
                resulting,
            });
        }

        let applied =
            repositories::stock_lots::apply_delta(txn, lot.id, request.quantity_change).await?;
        if !applied {
            // A concurrent writer consumed the headroom after our read.
            warn!(stock_lot_id = %lot.id, "Manual adjustment lost a concurrent race");
            return Err(ServiceError::NegativeQuantity {
                stock_lot_id: lot.id,
                resulting,
            });
        }

        // Authoritative post-update quantity for the journal row.
        let updated = repositories::stock_lots::find_scoped(txn, company_id, lot.id)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("stock lot {} vanished mid-transaction", lot.id))
            })?;

        let entry = inventory_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            stock_lot_id: Set(lot.id),
            company_id: Set(company_id),
            r#type: Set(request.entry_type.as_str().to_string()),
            quantity_change: Set(request.quantity_change),
            previous_quantity: Set(updated.quantity - request.quantity_change),
            new_quantity: Set(updated.quantity),
            is_manual: Set(true),
            is_reverted: Set(false),
            source_id: Set(request.source_id),
            source_type: Set(request.source_type.clone()),
            note: Set(request.note.clone()),
            user_id: Set(user_id),
            reverted_by_id: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

        Ok(entry)
    }

    /// Undoes a previously recorded quantity change: restores the lot to
    /// its pre-event quantity and marks the entry reverted. Single-use;
    /// a reverted entry is terminal.
    #[instrument(skip(self), fields(company_id = %company_id, log_id = %log_id))]
    pub async fn revert_log(
        &self,
        company_id: Uuid,
        log_id: Uuid,
        reverted_by: Uuid,
    ) -> Result<LogEntryResponse, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for log reversal");
            ServiceError::DatabaseError(e)
        })?;

        let outcome = tokio::time::timeout(
            self.transaction_budget,
            Self::execute_revert(&txn, company_id, log_id, reverted_by),
        )
        .await;

        let (entry, restored_quantity) = match outcome {
            Err(_elapsed) => {
                let _ = txn.rollback().await;
                return Err(ServiceError::TransactionTimeout(
                    self.transaction_budget.as_secs(),
                ));
            }
            Ok(Err(e)) => {
                let _ = txn.rollback().await;
                return Err(e);
            }
            Ok(Ok(result)) => {
                txn.commit().await.map_err(|e| {
                    error!(error = %e, "Failed to commit log reversal");
                    ServiceError::DatabaseError(e)
                })?;
                result
            }
        };

        info!(
            log_id = %entry.id,
            stock_lot_id = %entry.stock_lot_id,
            restored_quantity,
            "Inventory log entry reverted"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::InventoryLogReverted {
                    log_id: entry.id,
                    stock_lot_id: entry.stock_lot_id,
                    restored_quantity,
                })
                .await
            {
                warn!(error = %e, log_id = %entry.id, "Failed to send log reverted event");
            }
        }

        Ok(Self::to_response(entry))
    }

    async fn execute_revert(
        txn: &DatabaseTransaction,
        company_id: Uuid,
        log_id: Uuid,
        reverted_by: Uuid,
    ) -> Result<(inventory_log::Model, i32), ServiceError> {
        let entry = repositories::inventory_logs::find_scoped(txn, company_id, log_id)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Inventory log entry {} not found", log_id))
            })?;

        if entry.is_reverted {
            return Err(ServiceError::AlreadyReverted { log_id });
        }

        let lot = repositories::stock_lots::find_scoped(txn, company_id, entry.stock_lot_id)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Stock lot {} not found", entry.stock_lot_id))
            })?;

        // Undo the original signed delta.
        let inverse = -entry.quantity_change;
        let resulting = lot.quantity + inverse;
        if resulting < 0 {
            return Err(ServiceError::NegativeQuantity {
                stock_lot_id: lot.id,
                resulting,
            });
        }

        let applied = repositories::stock_lots::apply_delta(txn, lot.id, inverse).await?;
        if !applied {
            warn!(stock_lot_id = %lot.id, "Reversal lost a concurrent race");
            return Err(ServiceError::NegativeQuantity {
                stock_lot_id: lot.id,
                resulting,
            });
        }

        // Atomic check-then-set on the reversal flag.
        let flipped = repositories::inventory_logs::mark_reverted(txn, log_id, reverted_by).await?;
        if !flipped {
            return Err(ServiceError::AlreadyReverted { log_id });
        }

        let updated = repositories::inventory_logs::find_scoped(txn, company_id, log_id)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("log entry {} vanished mid-transaction", log_id))
            })?;

        Ok((updated, resulting))
    }

    /// Tenant-scoped journal listing, newest first. Read path only.
    #[instrument(skip(self, filter), fields(company_id = %company_id))]
    pub async fn list_logs(
        &self,
        company_id: Uuid,
        filter: LogFilter,
    ) -> Result<LogListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = filter.page.max(1);
        let per_page = filter.per_page.max(1);

        let (entries, total) = repositories::inventory_logs::list_scoped(
            db,
            company_id,
            filter.stock_lot_id,
            filter.entry_type,
            page,
            per_page,
        )
        .await
        .map_err(ServiceError::DatabaseError)?;

        Ok(LogListResponse {
            entries: entries.into_iter().map(Self::to_response).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Explicit field-by-field response construction.
    fn to_response(entry: inventory_log::Model) -> LogEntryResponse {
        LogEntryResponse {
            id: entry.id,
            stock_lot_id: entry.stock_lot_id,
            company_id: entry.company_id,
            entry_type: entry.r#type,
            quantity_change: entry.quantity_change,
            previous_quantity: entry.previous_quantity,
            new_quantity: entry.new_quantity,
            is_manual: entry.is_manual,
            is_reverted: entry.is_reverted,
            source_id: entry.source_id,
            source_type: entry.source_type,
            note: entry.note,
            user_id: entry.user_id,
            reverted_by_id: entry.reverted_by_id,
            created_at: entry.created_at,
        }
    }
}
