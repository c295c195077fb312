use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        products::ProductList,
        users::{AddWishlistRequest, ChangePasswordRequest, UpdateProfileRequest},
    },
    entity::{
        products::Entity as Products,
        users::{ActiveModel as UserActive, Entity as Users},
        wishlists::{ActiveModel as WishlistActive, Column as WishCol, Entity as Wishlists},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Product, User},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::{
        auth_service::{hash_password, validate_password, verify_password},
        product_service::stock_by_product,
    },
    state::AppState,
};

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let existing = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: UserActive = existing.into();
    if let Some(username) = payload.username {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(AppError::BadRequest("Username must not be empty".into()));
        }
        active.username = Set(username);
    }
    if let Some(avatar_url) = payload.avatar_url {
        active.avatar_url = Set(Some(avatar_url).filter(|url| !url.is_empty()));
    }
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Profile updated",
        User::from(updated),
        Some(Meta::empty()),
    ))
}

pub async fn change_password(
    state: &AppState,
    user: &AuthUser,
    payload: ChangePasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    validate_password(&payload.new_password)?;
    let existing = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if let Some(current_hash) = existing.password_hash.as_deref() {
        let current = payload
            .current_password
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Current password is required".into()))?;
        if !verify_password(current, current_hash)? {
            return Err(AppError::BadRequest("Current password is incorrect".into()));
        }
    }

    let mut active: UserActive = existing.into();
    active.password_hash = Set(Some(hash_password(&payload.new_password)?));
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "password_change",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::ok("Password updated"))
}

pub async fn list_wishlist(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Wishlists::find()
        .filter(WishCol::UserId.eq(user.user_id))
        .order_by_desc(WishCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let rows = finder
        .find_also_related(Products)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let products: Vec<_> = rows.into_iter().filter_map(|(_, product)| product).collect();
    let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
    let stock = stock_by_product(state, &ids).await?;

    let items = products
        .into_iter()
        .map(|p| {
            let count = stock.get(&p.id).copied().unwrap_or(0);
            Product::from_entity(p, count)
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Wishlist", ProductList { items }, Some(meta)))
}

pub async fn add_to_wishlist(
    state: &AppState,
    user: &AuthUser,
    payload: AddWishlistRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let product_exists = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .is_some();
    if !product_exists {
        return Err(AppError::NotFound);
    }

    let entry = WishlistActive {
        user_id: Set(user.user_id),
        product_id: Set(payload.product_id),
        created_at: Set(Utc::now().into()),
    };
    Wishlists::insert(entry)
        .on_conflict(
            OnConflict::columns([WishCol::UserId, WishCol::ProductId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Added to wishlist",
        serde_json::json!({ "product_id": payload.product_id }),
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_wishlist(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Wishlists::delete_by_id((user.user_id, product_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::ok("Removed from wishlist"))
}
