use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{inventory_log, sale, sale_item, LogEntryType},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories,
    services::allocation::{self, AllocationRequest},
};

const DEFAULT_TRANSACTION_BUDGET: Duration = Duration::from_secs(15);
const DEFAULT_STATUS: &str = "completed";
const DEFAULT_PAYMENT_STATUS: &str = "pending";

/// Request/Response types for the sale service
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateSaleRequest {
    pub client_id: Option<Uuid>,
    /// Defaults to now when unspecified.
    pub sale_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub total: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[validate(length(min = 1, message = "at least one sale item is required"))]
    pub items: Vec<SaleItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SaleItemRequest {
    pub product_variant_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub total: Decimal,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaleResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub client_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub sale_date: DateTime<Utc>,
    pub status: String,
    pub payment_status: String,
    pub total: Decimal,
    pub discount: Decimal,
    pub created_at: DateTime<Utc>,
    pub items: Vec<SaleItemResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaleItemResponse {
    pub id: Uuid,
    pub product_variant_id: Uuid,
    pub stock_lot_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Orchestrates the sale transaction: tenant-scoped variant validation,
/// FIFO allocation, sale and line-item persistence, guarded lot decrements
/// and audit-trail writes, all inside one all-or-nothing transaction.
#[derive(Clone)]
pub struct SaleService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    transaction_budget: Duration,
}

impl SaleService {
    /// Creates a new sale service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
            transaction_budget: DEFAULT_TRANSACTION_BUDGET,
        }
    }

    /// Overrides the wall-clock budget for one sale transaction.
    pub fn with_transaction_budget(mut self, budget: Duration) -> Self {
        self.transaction_budget = budget;
        self
    }

    /// Creates a sale, allocating stock FIFO and journaling every lot
    /// decrement. On any failure the transaction rolls back whole; no
    /// partial sale, item, decrement, or log entry survives.
    #[instrument(skip(self, request), fields(company_id = %company_id, item_count = request.items.len()))]
    pub async fn create_sale(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        request: CreateSaleRequest,
    ) -> Result<SaleResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        for item in &request.items {
            item.validate()
                .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        }

        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for sale creation");
            ServiceError::DatabaseError(e)
        })?;

        let outcome = tokio::time::timeout(
            self.transaction_budget,
            self.execute_sale(&txn, company_id, user_id, &request),
        )
        .await;

        let response = match outcome {
            Err(_elapsed) => {
                warn!(
                    budget_secs = self.transaction_budget.as_secs(),
                    "Sale transaction exceeded its budget, rolling back"
                );
                let _ = txn.rollback().await;
                return Err(ServiceError::TransactionTimeout(
                    self.transaction_budget.as_secs(),
                ));
            }
            Ok(Err(e)) => {
                let _ = txn.rollback().await;
                return Err(e);
            }
            Ok(Ok(response)) => {
                txn.commit().await.map_err(|e| {
                    error!(error = %e, "Failed to commit sale transaction");
                    ServiceError::DatabaseError(e)
                })?;
                response
            }
        };

        info!(
            sale_id = %response.id,
            company_id = %company_id,
            item_count = response.items.len(),
            "Sale created successfully"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::SaleCompleted {
                    sale_id: response.id,
                    company_id,
                    item_count: response.items.len(),
                })
                .await
            {
                warn!(error = %e, sale_id = %response.id, "Failed to send sale completed event");
            }
        }

        Ok(response)
    }

    /// Runs every step of the sale inside the supplied transaction handle.
    /// Errors returned from here roll the whole transaction back.
    async fn execute_sale(
        &self,
        txn: &DatabaseTransaction,
        company_id: Uuid,
        user_id: Option<Uuid>,
        request: &CreateSaleRequest,
    ) -> Result<SaleResponse, ServiceError> {
        // Step 1: every referenced variant must exist under this tenant;
        // report all missing ids, not just the first.
        let requested_ids: Vec<Uuid> = {
            let mut seen = HashSet::new();
            request
                .items
                .iter()
                .map(|item| item.product_variant_id)
                .filter(|id| seen.insert(*id))
                .collect()
        };

        let existing: HashSet<Uuid> =
            repositories::variants::find_existing_ids(txn, company_id, &requested_ids)
                .await
                .map_err(ServiceError::DatabaseError)?
                .into_iter()
                .collect();

        let missing: Vec<Uuid> = requested_ids
            .iter()
            .copied()
            .filter(|id| !existing.contains(id))
            .collect();
        if !missing.is_empty() {
            warn!(missing = ?missing, "Sale rejected: unknown product variants");
            return Err(ServiceError::UnknownVariants(missing));
        }

        // Step 2: snapshot consumable lots and plan the allocation.
        let lots =
            repositories::stock_lots::fifo_available_for_variants(txn, company_id, &requested_ids)
                .await
                .map_err(ServiceError::DatabaseError)?;

        let alloc_requests: Vec<AllocationRequest> = request
            .items
            .iter()
            .map(|item| AllocationRequest {
                product_variant_id: item.product_variant_id,
                quantity: item.quantity,
            })
            .collect();

        let plan = allocation::plan_allocation(&alloc_requests, &lots)?;

        // Step 3: persist the sale.
        let now = Utc::now();
        let sale_id = Uuid::new_v4();
        let sale_model = sale::ActiveModel {
            id: Set(sale_id),
            company_id: Set(company_id),
            client_id: Set(request.client_id),
            user_id: Set(user_id),
            sale_date: Set(request.sale_date.unwrap_or(now)),
            status: Set(request
                .status
                .clone()
                .unwrap_or_else(|| DEFAULT_STATUS.to_string())),
            payment_status: Set(request
                .payment_status
                .clone()
                .unwrap_or_else(|| DEFAULT_PAYMENT_STATUS.to_string())),
            total: Set(request.total),
            discount: Set(request.discount),
            created_at: Set(now),
        }
        .insert(txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

        // Step 4: one sale item per allocation line. Pricing is
        // caller-supplied business data; a caller line split across lots
        // copies its unit price onto every row and carries its discount on
        // the first row only.
        let mut items = Vec::with_capacity(plan.len());
        let mut discounted_requests: HashSet<usize> = HashSet::new();
        for line in &plan {
            let requested = &request.items[line.request_index];
            let discount = if discounted_requests.insert(line.request_index) {
                requested.discount
            } else {
                Decimal::ZERO
            };
            let row_total = requested.unit_price * Decimal::from(line.quantity) - discount;

            let item = sale_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                sale_id: Set(sale_id),
                product_variant_id: Set(line.product_variant_id),
                stock_lot_id: Set(Some(line.stock_lot_id)),
                quantity: Set(line.quantity),
                unit_price: Set(requested.unit_price),
                discount: Set(discount),
                total: Set(row_total),
            }
            .insert(txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
            items.push(item);
        }

        // Step 5: replay the plan into guarded decrements plus one audit
        // entry per take.
        for line in &plan {
            let decremented =
                repositories::stock_lots::decrement_quantity(txn, line.stock_lot_id, line.quantity)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
            if !decremented {
                // A concurrent sale consumed the units between our
                // snapshot and this write.
                warn!(
                    stock_lot_id = %line.stock_lot_id,
                    quantity = line.quantity,
                    "Lot decrement lost a concurrent race, aborting sale"
                );
                return Err(ServiceError::InsufficientStock {
                    variant_id: line.product_variant_id,
                    missing: line.quantity,
                });
            }

            // Re-read the row the decrement produced so the journal entry
            // matches the committed lot quantity exactly.
            let lot = repositories::stock_lots::find_scoped(txn, company_id, line.stock_lot_id)
                .await
                .map_err(ServiceError::DatabaseError)?
                .ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "stock lot {} vanished mid-transaction",
                        line.stock_lot_id
                    ))
                })?;

            inventory_log::ActiveModel {
                id: Set(Uuid::new_v4()),
                stock_lot_id: Set(line.stock_lot_id),
                company_id: Set(company_id),
                r#type: Set(LogEntryType::Sale.as_str().to_string()),
                quantity_change: Set(-line.quantity),
                previous_quantity: Set(lot.quantity + line.quantity),
                new_quantity: Set(lot.quantity),
                is_manual: Set(false),
                is_reverted: Set(false),
                source_id: Set(Some(sale_id)),
                source_type: Set(Some("SALE".to_string())),
                note: Set(request.items[line.request_index].note.clone()),
                user_id: Set(user_id),
                reverted_by_id: Set(None),
                created_at: Set(now),
            }
            .insert(txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        }

        Ok(Self::to_response(sale_model, items))
    }

    /// Explicit field-by-field response construction; optional fields stay
    /// `Option`, never stripped dynamically.
    fn to_response(sale: sale::Model, items: Vec<sale_item::Model>) -> SaleResponse {
        SaleResponse {
            id: sale.id,
            company_id: sale.company_id,
            client_id: sale.client_id,
            user_id: sale.user_id,
            sale_date: sale.sale_date,
            status: sale.status,
            payment_status: sale.payment_status,
            total: sale.total,
            discount: sale.discount,
            created_at: sale.created_at,
            items: items
                .into_iter()
                .map(|item| SaleItemResponse {
                    id: item.id,
                    product_variant_id: item.product_variant_id,
                    stock_lot_id: item.stock_lot_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    discount: item.discount,
                    total: item.total,
                })
                .collect(),
        }
    }
}
