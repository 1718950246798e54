use chrono::Utc;
use sea_orm::sea_query::{Expr, NullOrdering};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, JoinType, Order, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait,
};
use uuid::Uuid;

use crate::entities::product_variant;
use crate::entities::stock_lot::{self, Entity as StockLot};

/// Snapshot of consumable lots for the given variants, in allocation
/// order: soonest expiration first (lots without an expiration last),
/// tie-broken by entry date, then id. Tenant scope is enforced through the
/// lot -> variant join.
pub async fn fifo_available_for_variants<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    variant_ids: &[Uuid],
) -> Result<Vec<stock_lot::Model>, DbErr> {
    if variant_ids.is_empty() {
        return Ok(Vec::new());
    }

    StockLot::find()
        .join(JoinType::InnerJoin, stock_lot::Relation::ProductVariant.def())
        .filter(product_variant::Column::CompanyId.eq(company_id))
        .filter(stock_lot::Column::ProductVariantId.is_in(variant_ids.iter().copied()))
        .filter(stock_lot::Column::Quantity.gt(0))
        .filter(stock_lot::Column::IsActive.eq(true))
        .order_by_with_nulls(
            stock_lot::Column::ExpirationDate,
            Order::Asc,
            NullOrdering::Last,
        )
        .order_by_asc(stock_lot::Column::EntryDate)
        .order_by_asc(stock_lot::Column::Id)
        .all(conn)
        .await
}

/// Fetches one lot scoped to the tenant through its variant.
pub async fn find_scoped<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    lot_id: Uuid,
) -> Result<Option<stock_lot::Model>, DbErr> {
    StockLot::find_by_id(lot_id)
        .join(JoinType::InnerJoin, stock_lot::Relation::ProductVariant.def())
        .filter(product_variant::Column::CompanyId.eq(company_id))
        .one(conn)
        .await
}

/// Decrements a lot's quantity if and only if enough units remain
/// (`UPDATE ... SET quantity = quantity - n WHERE id = ? AND quantity >= n`).
///
/// Returns `false` when the guard matched no row, i.e. a concurrent
/// transaction consumed the units between the caller's snapshot read and
/// this write. The caller treats that as insufficient stock and aborts.
pub async fn decrement_quantity<C: ConnectionTrait>(
    conn: &C,
    lot_id: Uuid,
    quantity: i32,
) -> Result<bool, DbErr> {
    let result = StockLot::update_many()
        .col_expr(
            stock_lot::Column::Quantity,
            Expr::col(stock_lot::Column::Quantity).sub(quantity),
        )
        .col_expr(stock_lot::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(stock_lot::Column::Id.eq(lot_id))
        .filter(stock_lot::Column::Quantity.gte(quantity))
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Applies a signed delta to a lot's quantity, guarded so the result can
/// never go negative even if a concurrent writer changed the row after the
/// caller's read. Returns `false` when the guard matched no row.
pub async fn apply_delta<C: ConnectionTrait>(
    conn: &C,
    lot_id: Uuid,
    delta: i32,
) -> Result<bool, DbErr> {
    let mut update = StockLot::update_many()
        .col_expr(
            stock_lot::Column::Quantity,
            Expr::col(stock_lot::Column::Quantity).add(delta),
        )
        .col_expr(stock_lot::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(stock_lot::Column::Id.eq(lot_id));

    if delta < 0 {
        update = update.filter(stock_lot::Column::Quantity.gte(-delta));
    }

    let result = update.exec(conn).await?;
    Ok(result.rows_affected == 1)
}

/// Lists lots for the tenant, optionally narrowed to one variant, in the
/// same order the allocator consumes them.
pub async fn list_scoped<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    variant_id: Option<Uuid>,
) -> Result<Vec<stock_lot::Model>, DbErr> {
    let mut query = StockLot::find()
        .join(JoinType::InnerJoin, stock_lot::Relation::ProductVariant.def())
        .filter(product_variant::Column::CompanyId.eq(company_id));

    if let Some(variant_id) = variant_id {
        query = query.filter(stock_lot::Column::ProductVariantId.eq(variant_id));
    }

    query
        .order_by_with_nulls(
            stock_lot::Column::ExpirationDate,
            Order::Asc,
            NullOrdering::Last,
        )
        .order_by_asc(stock_lot::Column::EntryDate)
        .order_by_asc(stock_lot::Column::Id)
        .all(conn)
        .await
}
