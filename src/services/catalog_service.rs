use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::catalog::{GenreList, NameRequest, PlatformList},
    entity::{
        genres::{ActiveModel as GenreActive, Column as GenreCol, Entity as Genres},
        inventory::{Column as InvCol, Entity as Inventory},
        platforms::{ActiveModel as PlatformActive, Column as PlatformCol, Entity as Platforms},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Genre, Platform},
    response::{ApiResponse, Meta},
    state::AppState,
};

fn clean_name(payload: NameRequest) -> AppResult<String> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    Ok(name)
}

// Platforms

pub async fn list_platforms(state: &AppState) -> AppResult<ApiResponse<PlatformList>> {
    let items: Vec<Platform> = Platforms::find()
        .order_by_asc(PlatformCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Platform::from)
        .collect();
    let meta = Meta::total(items.len() as i64);
    Ok(ApiResponse::success("Platforms", PlatformList { items }, Some(meta)))
}

pub async fn get_platform(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Platform>> {
    let platform = Platforms::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Platform", Platform::from(platform), None))
}

pub async fn create_platform(
    state: &AppState,
    user: &AuthUser,
    payload: NameRequest,
) -> AppResult<ApiResponse<Platform>> {
    ensure_admin(user)?;
    let name = clean_name(payload)?;

    let platform = PlatformActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await
    .map_err(|err| AppError::on_unique(err, "Platform already exists"))?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "platform_create",
        "platforms",
        serde_json::json!({ "platform_id": platform.id, "name": platform.name }),
    )
    .await;

    Ok(ApiResponse::success(
        "Platform created",
        Platform::from(platform),
        Some(Meta::empty()),
    ))
}

pub async fn update_platform(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: NameRequest,
) -> AppResult<ApiResponse<Platform>> {
    ensure_admin(user)?;
    let name = clean_name(payload)?;
    let existing = Platforms::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: PlatformActive = existing.into();
    active.name = Set(name);
    let platform = active
        .update(&state.orm)
        .await
        .map_err(|err| AppError::on_unique(err, "Platform already exists"))?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "platform_update",
        "platforms",
        serde_json::json!({ "platform_id": platform.id, "name": platform.name }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Platform::from(platform),
        Some(Meta::empty()),
    ))
}

pub async fn delete_platform(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    Platforms::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let keys = Inventory::find()
        .filter(InvCol::PlatformId.eq(id))
        .count(&state.orm)
        .await?;
    if keys > 0 {
        return Err(AppError::Conflict(
            "Platform still has keys in the inventory".into(),
        ));
    }

    Platforms::delete_by_id(id).exec(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "platform_delete",
        "platforms",
        serde_json::json!({ "platform_id": id }),
    )
    .await;

    Ok(ApiResponse::ok("Deleted"))
}

// Genres

pub async fn list_genres(state: &AppState) -> AppResult<ApiResponse<GenreList>> {
    let items: Vec<Genre> = Genres::find()
        .order_by_asc(GenreCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Genre::from)
        .collect();
    let meta = Meta::total(items.len() as i64);
    Ok(ApiResponse::success("Genres", GenreList { items }, Some(meta)))
}

pub async fn get_genre(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Genre>> {
    let genre = Genres::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Genre", Genre::from(genre), None))
}

pub async fn create_genre(
    state: &AppState,
    user: &AuthUser,
    payload: NameRequest,
) -> AppResult<ApiResponse<Genre>> {
    ensure_admin(user)?;
    let name = clean_name(payload)?;

    let genre = GenreActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await
    .map_err(|err| AppError::on_unique(err, "Genre already exists"))?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "genre_create",
        "genres",
        serde_json::json!({ "genre_id": genre.id, "name": genre.name }),
    )
    .await;

    Ok(ApiResponse::success(
        "Genre created",
        Genre::from(genre),
        Some(Meta::empty()),
    ))
}

pub async fn update_genre(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: NameRequest,
) -> AppResult<ApiResponse<Genre>> {
    ensure_admin(user)?;
    let name = clean_name(payload)?;
    let existing = Genres::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: GenreActive = existing.into();
    active.name = Set(name);
    let genre = active
        .update(&state.orm)
        .await
        .map_err(|err| AppError::on_unique(err, "Genre already exists"))?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "genre_update",
        "genres",
        serde_json::json!({ "genre_id": genre.id, "name": genre.name }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Genre::from(genre),
        Some(Meta::empty()),
    ))
}

pub async fn delete_genre(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Genres::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "genre_delete",
        "genres",
        serde_json::json!({ "genre_id": id }),
    )
    .await;

    Ok(ApiResponse::ok("Deleted"))
}
