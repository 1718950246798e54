use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::entities::inventory_log::{self, Entity as InventoryLog, LogEntryType};

/// Fetches one log entry scoped to the tenant.
pub async fn find_scoped<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    log_id: Uuid,
) -> Result<Option<inventory_log::Model>, DbErr> {
    InventoryLog::find_by_id(log_id)
        .filter(inventory_log::Column::CompanyId.eq(company_id))
        .one(conn)
        .await
}

/// Flips the reversal flag, conditional on the entry not being reverted
/// yet. The `is_reverted = false` predicate makes the check-then-set a
/// single atomic statement; `false` means the entry was already reverted.
pub async fn mark_reverted<C: ConnectionTrait>(
    conn: &C,
    log_id: Uuid,
    reverted_by: Uuid,
) -> Result<bool, DbErr> {
    let result = InventoryLog::update_many()
        .col_expr(inventory_log::Column::IsReverted, Expr::value(true))
        .col_expr(inventory_log::Column::RevertedById, Expr::value(reverted_by))
        .filter(inventory_log::Column::Id.eq(log_id))
        .filter(inventory_log::Column::IsReverted.eq(false))
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Tenant-scoped journal page, newest first.
pub async fn list_scoped<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    stock_lot_id: Option<Uuid>,
    entry_type: Option<LogEntryType>,
    page: u64,
    per_page: u64,
) -> Result<(Vec<inventory_log::Model>, u64), DbErr> {
    let mut query = InventoryLog::find().filter(inventory_log::Column::CompanyId.eq(company_id));

    if let Some(stock_lot_id) = stock_lot_id {
        query = query.filter(inventory_log::Column::StockLotId.eq(stock_lot_id));
    }
    if let Some(entry_type) = entry_type {
        query = query.filter(inventory_log::Column::Type.eq(entry_type.as_str()));
    }

    let paginator = query
        .order_by_desc(inventory_log::Column::CreatedAt)
        .paginate(conn, per_page);

    let total = paginator.num_items().await?;
    let entries = paginator.fetch_page(page.saturating_sub(1)).await?;

    Ok((entries, total))
}

/// Non-reverted entries for one lot, oldest first. Used by the ledger
/// reconstruction checks.
pub async fn active_entries_for_lot<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    stock_lot_id: Uuid,
) -> Result<Vec<inventory_log::Model>, DbErr> {
    InventoryLog::find()
        .filter(inventory_log::Column::CompanyId.eq(company_id))
        .filter(inventory_log::Column::StockLotId.eq(stock_lot_id))
        .filter(inventory_log::Column::IsReverted.eq(false))
        .order_by_asc(inventory_log::Column::CreatedAt)
        .all(conn)
        .await
}
