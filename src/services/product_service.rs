use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        genres::{Column as GenreCol, Entity as Genres},
        inventory::{Column as InvCol, Entity as Inventory},
        platforms::{Column as PlatformCol, Entity as Platforms},
        product_genres::{
            ActiveModel as ProductGenreActive, Column as ProductGenreCol, Entity as ProductGenres,
        },
        product_platforms::{
            ActiveModel as ProductPlatformActive, Column as ProductPlatformCol,
            Entity as ProductPlatforms,
        },
        products::{ActiveModel, Column, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Genre, MAX_PRICE, PlatformStock, Product, ProductDetail},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

/// Unsold key counts per product.
pub async fn stock_by_product(state: &AppState, ids: &[Uuid]) -> AppResult<HashMap<Uuid, i64>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, i64)> = Inventory::find()
        .select_only()
        .column(InvCol::ProductId)
        .column_as(Expr::col(InvCol::Id).count(), "available")
        .filter(InvCol::IsSold.eq(false))
        .filter(InvCol::ProductId.is_in(ids.to_vec()))
        .group_by(InvCol::ProductId)
        .into_tuple()
        .all(&state.orm)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Unsold key counts per platform for a single product.
pub async fn stock_by_platform(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<HashMap<Uuid, i64>> {
    let rows: Vec<(Uuid, i64)> = Inventory::find()
        .select_only()
        .column(InvCol::PlatformId)
        .column_as(Expr::col(InvCol::Id).count(), "available")
        .filter(InvCol::IsSold.eq(false))
        .filter(InvCol::ProductId.eq(product_id))
        .group_by(InvCol::PlatformId)
        .into_tuple()
        .all(&state.orm)
        .await?;
    Ok(rows.into_iter().collect())
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    if let Some(platform_id) = query.platform_id {
        condition = condition.add(
            Column::Id.in_subquery(
                Query::select()
                    .column(ProductPlatformCol::ProductId)
                    .from(ProductPlatforms)
                    .and_where(ProductPlatformCol::PlatformId.eq(platform_id))
                    .to_owned(),
            ),
        );
    }

    if let Some(genre_id) = query.genre_id {
        condition = condition.add(
            Column::Id.in_subquery(
                Query::select()
                    .column(ProductGenreCol::ProductId)
                    .from(ProductGenres)
                    .and_where(ProductGenreCol::GenreId.eq(genre_id))
                    .to_owned(),
            ),
        );
    }

    if let Some(in_stock) = query.in_stock {
        let available = Query::select()
            .column(InvCol::ProductId)
            .from(Inventory)
            .and_where(InvCol::IsSold.eq(false))
            .to_owned();
        condition = condition.add(if in_stock {
            Column::Id.in_subquery(available)
        } else {
            Column::Id.not_in_subquery(available)
        });
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let stock = stock_by_product(state, &ids).await?;
    let items = models
        .into_iter()
        .map(|m| {
            let count = stock.get(&m.id).copied().unwrap_or(0);
            Product::from_entity(m, count)
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    let data = ProductList { items };
    Ok(ApiResponse::success("Products", data, Some(meta)))
}

pub async fn load_detail(state: &AppState, id: Uuid) -> AppResult<ProductDetail> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let platforms = product
        .find_related(Platforms)
        .order_by_asc(PlatformCol::Name)
        .all(&state.orm)
        .await?;
    let genres = product
        .find_related(Genres)
        .order_by_asc(GenreCol::Name)
        .all(&state.orm)
        .await?;
    let per_platform = stock_by_platform(state, id).await?;

    let platforms: Vec<PlatformStock> = platforms
        .into_iter()
        .map(|p| PlatformStock {
            stock: per_platform.get(&p.id).copied().unwrap_or(0),
            id: p.id,
            name: p.name,
        })
        .collect();
    let total_stock = per_platform.values().sum();

    Ok(ProductDetail {
        product: Product::from_entity(product, total_stock),
        platforms,
        genres: genres.into_iter().map(Genre::from).collect(),
    })
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let detail = load_detail(state, id).await?;
    Ok(ApiResponse::success("Product", detail, None))
}

pub fn validate_pricing(price: i64, discount_percent: i32) -> AppResult<()> {
    if !(0..=MAX_PRICE).contains(&price) {
        return Err(AppError::BadRequest(format!(
            "price must be between 0 and {MAX_PRICE}"
        )));
    }
    if !(0..=100).contains(&discount_percent) {
        return Err(AppError::BadRequest(
            "discount_percent must be between 0 and 100".into(),
        ));
    }
    Ok(())
}

fn dedup(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids.dedup();
    ids
}

async fn ensure_platforms_exist<C: ConnectionTrait>(db: &C, ids: &[Uuid]) -> AppResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let found = Platforms::find()
        .filter(PlatformCol::Id.is_in(ids.to_vec()))
        .count(db)
        .await?;
    if found as usize != ids.len() {
        return Err(AppError::BadRequest("Unknown platform id".into()));
    }
    Ok(())
}

async fn ensure_genres_exist<C: ConnectionTrait>(db: &C, ids: &[Uuid]) -> AppResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let found = Genres::find()
        .filter(GenreCol::Id.is_in(ids.to_vec()))
        .count(db)
        .await?;
    if found as usize != ids.len() {
        return Err(AppError::BadRequest("Unknown genre id".into()));
    }
    Ok(())
}

async fn link_platforms<C: ConnectionTrait>(
    db: &C,
    product_id: Uuid,
    platform_ids: &[Uuid],
) -> AppResult<()> {
    if platform_ids.is_empty() {
        return Ok(());
    }
    ProductPlatforms::insert_many(platform_ids.iter().map(|platform_id| ProductPlatformActive {
        product_id: Set(product_id),
        platform_id: Set(*platform_id),
    }))
    .exec_without_returning(db)
    .await?;
    Ok(())
}

async fn link_genres<C: ConnectionTrait>(
    db: &C,
    product_id: Uuid,
    genre_ids: &[Uuid],
) -> AppResult<()> {
    if genre_ids.is_empty() {
        return Ok(());
    }
    ProductGenres::insert_many(genre_ids.iter().map(|genre_id| ProductGenreActive {
        product_id: Set(product_id),
        genre_id: Set(*genre_id),
    }))
    .exec_without_returning(db)
    .await?;
    Ok(())
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<ProductDetail>> {
    ensure_admin(user)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    validate_pricing(payload.price, payload.discount_percent)?;
    let platform_ids = dedup(payload.platform_ids);
    let genre_ids = dedup(payload.genre_ids);

    let txn = state.orm.begin().await?;
    ensure_platforms_exist(&txn, &platform_ids).await?;
    ensure_genres_exist(&txn, &genre_ids).await?;

    let now = Utc::now();
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description),
        price: Set(payload.price),
        discount_percent: Set(payload.discount_percent),
        image_url: Set(payload.image_url),
        developer: Set(payload.developer),
        publisher: Set(payload.publisher),
        release_date: Set(payload.release_date),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    link_platforms(&txn, product.id, &platform_ids).await?;
    link_genres(&txn, product.id, &genre_ids).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    let detail = load_detail(state, product.id).await?;
    Ok(ApiResponse::success(
        "Product created",
        detail,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<ProductDetail>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let existing = Products::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    validate_pricing(
        payload.price.unwrap_or(existing.price),
        payload.discount_percent.unwrap_or(existing.discount_percent),
    )?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name must not be empty".into()));
        }
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(discount) = payload.discount_percent {
        active.discount_percent = Set(discount);
    }
    if let Some(image_url) = payload.image_url {
        active.image_url = Set(Some(image_url));
    }
    if let Some(developer) = payload.developer {
        active.developer = Set(Some(developer));
    }
    if let Some(publisher) = payload.publisher {
        active.publisher = Set(Some(publisher));
    }
    if let Some(release_date) = payload.release_date {
        active.release_date = Set(Some(release_date));
    }
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    if let Some(platform_ids) = payload.platform_ids {
        let platform_ids = dedup(platform_ids);
        ensure_platforms_exist(&txn, &platform_ids).await?;

        // A platform with keys still on sale cannot be dropped from the product.
        let stranded = Inventory::find()
            .filter(InvCol::ProductId.eq(id))
            .filter(InvCol::IsSold.eq(false))
            .filter(InvCol::PlatformId.is_not_in(platform_ids.clone()))
            .count(&txn)
            .await?;
        if stranded > 0 {
            return Err(AppError::Conflict(
                "Cannot remove a platform that still has unsold keys".into(),
            ));
        }

        ProductPlatforms::delete_many()
            .filter(ProductPlatformCol::ProductId.eq(id))
            .exec(&txn)
            .await?;
        link_platforms(&txn, id, &platform_ids).await?;
    }

    if let Some(genre_ids) = payload.genre_ids {
        let genre_ids = dedup(genre_ids);
        ensure_genres_exist(&txn, &genre_ids).await?;
        ProductGenres::delete_many()
            .filter(ProductGenreCol::ProductId.eq(id))
            .exec(&txn)
            .await?;
        link_genres(&txn, id, &genre_ids).await?;
    }

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    let detail = load_detail(state, product.id).await?;
    Ok(ApiResponse::success("Updated", detail, Some(Meta::empty())))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::ok("Deleted"))
}
