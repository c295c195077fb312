use std::collections::HashSet;

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    dto::inventory::{AddKeysRequest, AddKeysResponse, InventoryList, StockRow, StockSummary},
    entity::{
        inventory::{ActiveModel as InventoryActive, Column as InvCol, Entity as Inventory},
        product_platforms::Entity as ProductPlatforms,
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::InventoryKey,
    response::{ApiResponse, Meta},
    routes::params::InventoryQuery,
    state::AppState,
};

/// Trims, drops blanks and collapses duplicates, keeping first-seen order.
pub fn normalize_keys(keys: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.into_iter()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

pub async fn list_keys(
    state: &AppState,
    user: &AuthUser,
    query: InventoryQuery,
) -> AppResult<ApiResponse<InventoryList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(product_id) = query.product_id {
        condition = condition.add(InvCol::ProductId.eq(product_id));
    }
    if let Some(platform_id) = query.platform_id {
        condition = condition.add(InvCol::PlatformId.eq(platform_id));
    }
    if let Some(is_sold) = query.is_sold {
        condition = condition.add(InvCol::IsSold.eq(is_sold));
    }

    let finder = Inventory::find()
        .filter(condition)
        .order_by_desc(InvCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(InventoryKey::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Inventory", InventoryList { items }, Some(meta)))
}

pub async fn add_keys(
    state: &AppState,
    user: &AuthUser,
    payload: AddKeysRequest,
) -> AppResult<ApiResponse<AddKeysResponse>> {
    ensure_admin(user)?;
    let keys = normalize_keys(payload.keys);
    if keys.is_empty() {
        return Err(AppError::BadRequest("keys must not be empty".into()));
    }

    Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let offered = ProductPlatforms::find_by_id((payload.product_id, payload.platform_id))
        .one(&state.orm)
        .await?
        .is_some();
    if !offered {
        return Err(AppError::BadRequest(
            "Product is not offered on this platform".into(),
        ));
    }

    let existing: HashSet<String> = Inventory::find()
        .select_only()
        .column(InvCol::KeyCode)
        .filter(InvCol::KeyCode.is_in(keys.clone()))
        .into_tuple::<String>()
        .all(&state.orm)
        .await?
        .into_iter()
        .collect();

    let (skipped, fresh): (Vec<String>, Vec<String>) =
        keys.into_iter().partition(|key| existing.contains(key));

    let mut inserted = 0;
    if !fresh.is_empty() {
        let now = Utc::now();
        let rows = fresh.into_iter().map(|key_code| InventoryActive {
            id: Set(Uuid::new_v4()),
            product_id: Set(payload.product_id),
            platform_id: Set(payload.platform_id),
            key_code: Set(key_code),
            is_sold: Set(false),
            order_id: Set(None),
            sold_at: Set(None),
            created_at: Set(now.into()),
        });
        // A concurrent import may win the race for a key; the unique index decides.
        inserted = Inventory::insert_many(rows)
            .on_conflict(OnConflict::column(InvCol::KeyCode).do_nothing().to_owned())
            .exec_without_returning(&state.orm)
            .await? as usize;
    }

    tracing::info!(
        product_id = %payload.product_id,
        platform_id = %payload.platform_id,
        inserted,
        skipped = skipped.len(),
        "keys imported"
    );

    audit::record(
        &state.pool,
        Some(user.user_id),
        "inventory_add",
        "inventory",
        serde_json::json!({
            "product_id": payload.product_id,
            "platform_id": payload.platform_id,
            "inserted": inserted,
            "skipped": skipped.len(),
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Keys added",
        AddKeysResponse { inserted, skipped },
        Some(Meta::empty()),
    ))
}

pub async fn delete_key(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let key = Inventory::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if key.is_sold {
        return Err(AppError::BadRequest("Sold keys cannot be deleted".into()));
    }

    // Guarded on is_sold so a key reserved meanwhile survives.
    let result = Inventory::delete_many()
        .filter(InvCol::Id.eq(id))
        .filter(InvCol::IsSold.eq(false))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::BadRequest("Sold keys cannot be deleted".into()));
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "inventory_delete",
        "inventory",
        serde_json::json!({ "key_id": id, "product_id": key.product_id }),
    )
    .await;

    Ok(ApiResponse::ok("Deleted"))
}

/// Available and sold counts for every (product, platform) pair on sale,
/// optionally only those with at most `max_available` keys left.
pub async fn stock_rows(pool: &DbPool, max_available: Option<i64>) -> AppResult<Vec<StockRow>> {
    let rows = sqlx::query_as::<_, StockRow>(
        r#"
        SELECT p.id AS product_id,
               p.name AS product_name,
               pl.id AS platform_id,
               pl.name AS platform_name,
               COUNT(i.id) FILTER (WHERE i.is_sold = FALSE) AS available,
               COUNT(i.id) FILTER (WHERE i.is_sold = TRUE) AS sold
        FROM product_platforms pp
        JOIN products p ON p.id = pp.product_id
        JOIN platforms pl ON pl.id = pp.platform_id
        LEFT JOIN inventory i
               ON i.product_id = pp.product_id AND i.platform_id = pp.platform_id
        GROUP BY p.id, p.name, pl.id, pl.name
        HAVING $1::BIGINT IS NULL
            OR COUNT(i.id) FILTER (WHERE i.is_sold = FALSE) <= $1::BIGINT
        ORDER BY available ASC, p.name ASC, pl.name ASC
        "#,
    )
    .bind(max_available)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn summary(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<StockSummary>> {
    ensure_admin(user)?;
    let items = stock_rows(&state.pool, None).await?;
    let meta = Meta::total(items.len() as i64);
    Ok(ApiResponse::success(
        "Inventory summary",
        StockSummary { items },
        Some(meta),
    ))
}
