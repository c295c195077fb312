//! Platforms and genres: small named lookups shared by the catalog.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::catalog::{GenreList, NameRequest, PlatformList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Genre, Platform},
    response::ApiResponse,
    services::catalog_service,
    state::AppState,
};

pub fn platforms_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_platforms).post(create_platform))
        .route(
            "/{id}",
            get(get_platform)
                .put(update_platform)
                .delete(delete_platform),
        )
}

pub fn genres_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_genres).post(create_genre))
        .route(
            "/{id}",
            get(get_genre).put(update_genre).delete(delete_genre),
        )
}

#[utoipa::path(
    get,
    path = "/api/platforms",
    responses((status = 200, description = "All platforms", body = ApiResponse<PlatformList>)),
    tag = "Platforms"
)]
pub async fn list_platforms(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<PlatformList>>> {
    Ok(Json(catalog_service::list_platforms(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/platforms/{id}",
    params(("id" = Uuid, Path, description = "Platform id")),
    responses(
        (status = 200, description = "Platform", body = ApiResponse<Platform>),
        (status = 404, description = "Not found")
    ),
    tag = "Platforms"
)]
pub async fn get_platform(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Platform>>> {
    Ok(Json(catalog_service::get_platform(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/platforms",
    request_body = NameRequest,
    responses(
        (status = 201, description = "Platform created", body = ApiResponse<Platform>),
        (status = 409, description = "Name already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Platforms"
)]
pub async fn create_platform(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NameRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Platform>>)> {
    let resp = catalog_service::create_platform(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/platforms/{id}",
    params(("id" = Uuid, Path, description = "Platform id")),
    request_body = NameRequest,
    responses(
        (status = 200, description = "Platform renamed", body = ApiResponse<Platform>),
        (status = 404, description = "Not found"),
        (status = 409, description = "Name already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Platforms"
)]
pub async fn update_platform(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<NameRequest>,
) -> AppResult<Json<ApiResponse<Platform>>> {
    let resp = catalog_service::update_platform(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/platforms/{id}",
    params(("id" = Uuid, Path, description = "Platform id")),
    responses(
        (status = 200, description = "Platform deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Not found"),
        (status = 409, description = "Platform still has inventory")
    ),
    security(("bearer_auth" = [])),
    tag = "Platforms"
)]
pub async fn delete_platform(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = catalog_service::delete_platform(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/genres",
    responses((status = 200, description = "All genres", body = ApiResponse<GenreList>)),
    tag = "Genres"
)]
pub async fn list_genres(State(state): State<AppState>) -> AppResult<Json<ApiResponse<GenreList>>> {
    Ok(Json(catalog_service::list_genres(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/genres/{id}",
    params(("id" = Uuid, Path, description = "Genre id")),
    responses(
        (status = 200, description = "Genre", body = ApiResponse<Genre>),
        (status = 404, description = "Not found")
    ),
    tag = "Genres"
)]
pub async fn get_genre(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Genre>>> {
    Ok(Json(catalog_service::get_genre(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/genres",
    request_body = NameRequest,
    responses(
        (status = 201, description = "Genre created", body = ApiResponse<Genre>),
        (status = 409, description = "Name already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Genres"
)]
pub async fn create_genre(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NameRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Genre>>)> {
    let resp = catalog_service::create_genre(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/genres/{id}",
    params(("id" = Uuid, Path, description = "Genre id")),
    request_body = NameRequest,
    responses(
        (status = 200, description = "Genre renamed", body = ApiResponse<Genre>),
        (status = 404, description = "Not found"),
        (status = 409, description = "Name already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Genres"
)]
pub async fn update_genre(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<NameRequest>,
) -> AppResult<Json<ApiResponse<Genre>>> {
    let resp = catalog_service::update_genre(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/genres/{id}",
    params(("id" = Uuid, Path, description = "Genre id")),
    responses(
        (status = 200, description = "Genre deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Genres"
)]
pub async fn delete_genre(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = catalog_service::delete_genre(&state, &user, id).await?;
    Ok(Json(resp))
}
