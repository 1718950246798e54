use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::entities::product_variant::{self, Entity as ProductVariant};

/// Returns the subset of `ids` that exist, are active, and belong to the
/// tenant. The caller diffs against its request to report every missing id
/// at once.
pub async fn find_existing_ids<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Uuid>, DbErr> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    ProductVariant::find()
        .select_only()
        .column(product_variant::Column::Id)
        .filter(product_variant::Column::CompanyId.eq(company_id))
        .filter(product_variant::Column::IsActive.eq(true))
        .filter(product_variant::Column::Id.is_in(ids.iter().copied()))
        .into_tuple()
        .all(conn)
        .await
}

/// Fetches one variant scoped to the tenant.
pub async fn find_scoped<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    variant_id: Uuid,
) -> Result<Option<product_variant::Model>, DbErr> {
    ProductVariant::find_by_id(variant_id)
        .filter(product_variant::Column::CompanyId.eq(company_id))
        .one(conn)
        .await
}
