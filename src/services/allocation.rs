//! FIFO stock allocation.
//!
//! Pure planning logic: given the requested quantities and a snapshot of
//! consumable lots, compute which lot serves how many units, or fail. The
//! planner never mutates anything; the orchestrator replays the plan into
//! ledger updates and audit entries inside its transaction.

use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::entities::stock_lot;
use crate::errors::ServiceError;

/// One requested (variant, quantity) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest {
    pub product_variant_id: Uuid,
    pub quantity: i32,
}

/// One planned take from one lot.
///
/// `previous_quantity` is the lot's remaining quantity immediately before
/// this take within the plan, so successive takes from one lot chain
/// (100 -> 70 -> 40, not 100 -> 100).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationLine {
    pub stock_lot_id: Uuid,
    pub product_variant_id: Uuid,
    pub quantity: i32,
    pub previous_quantity: i32,
    pub unit_cost: Decimal,
    /// Index of the request line this take serves.
    pub request_index: usize,
}

/// Computes a FIFO/expiration-priority allocation plan.
///
/// Lots are consumed soonest-expiring first (no expiration sorts last),
/// tie-broken by entry date, then id, so the plan is deterministic for an
/// identical snapshot. Fails with [`ServiceError::OutOfStock`] when a
/// variant has no consumable lot and [`ServiceError::InsufficientStock`]
/// when the pool cannot cover the request; either way no partial plan is
/// returned.
pub fn plan_allocation(
    requests: &[AllocationRequest],
    lots: &[stock_lot::Model],
) -> Result<Vec<AllocationLine>, ServiceError> {
    for request in requests {
        if request.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "requested quantity for variant {} must be positive",
                request.product_variant_id
            )));
        }
    }

    // Per-variant lot queues in consumption order.
    let mut ordered: HashMap<Uuid, Vec<&stock_lot::Model>> = HashMap::new();
    for lot in lots {
        if lot.quantity > 0 && lot.is_active {
            ordered.entry(lot.product_variant_id).or_default().push(lot);
        }
    }
    for queue in ordered.values_mut() {
        queue.sort_by(|a, b| {
            lot_sort_key(a).cmp(&lot_sort_key(b))
        });
    }

    // Remaining units per lot, shared across request lines so a variant
    // requested twice keeps depleting the same pool.
    let mut remaining: HashMap<Uuid, i32> = lots.iter().map(|l| (l.id, l.quantity)).collect();

    let mut plan = Vec::new();

    for (request_index, request) in requests.iter().enumerate() {
        let queue = ordered
            .get(&request.product_variant_id)
            .filter(|queue| queue.iter().any(|lot| remaining[&lot.id] > 0))
            .ok_or(ServiceError::OutOfStock {
                variant_id: request.product_variant_id,
            })?;

        let mut needed = request.quantity;
        for lot in queue {
            if needed == 0 {
                break;
            }
            let available = remaining[&lot.id];
            if available == 0 {
                continue;
            }
            let take = needed.min(available);
            plan.push(AllocationLine {
                stock_lot_id: lot.id,
                product_variant_id: lot.product_variant_id,
                quantity: take,
                previous_quantity: available,
                unit_cost: lot.unit_cost,
                request_index,
            });
            remaining.insert(lot.id, available - take);
            needed -= take;
        }

        if needed > 0 {
            return Err(ServiceError::InsufficientStock {
                variant_id: request.product_variant_id,
                missing: needed,
            });
        }
    }

    Ok(plan)
}

type LotSortKey = (bool, Option<chrono::NaiveDate>, chrono::DateTime<chrono::Utc>, Uuid);

fn lot_sort_key(lot: &stock_lot::Model) -> LotSortKey {
    (
        lot.expiration_date.is_none(),
        lot.expiration_date,
        lot.entry_date,
        lot.id,
    )
}
