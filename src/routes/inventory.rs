use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::inventory::{AddKeysRequest, AddKeysResponse, InventoryList, StockSummary},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::InventoryQuery,
    services::inventory_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_keys).post(add_keys))
        .route("/summary", get(summary))
        .route("/{id}", delete(delete_key))
}

#[utoipa::path(
    get,
    path = "/api/inventory",
    params(InventoryQuery),
    responses(
        (status = 200, description = "Keys, newest first", body = ApiResponse<InventoryList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Inventory"
)]
pub async fn list_keys(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<InventoryQuery>,
) -> AppResult<Json<ApiResponse<InventoryList>>> {
    let resp = inventory_service::list_keys(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/inventory",
    request_body = AddKeysRequest,
    responses(
        (status = 201, description = "Keys imported; duplicates reported as skipped", body = ApiResponse<AddKeysResponse>),
        (status = 400, description = "No keys, or product not offered on the platform"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Inventory"
)]
pub async fn add_keys(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddKeysRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AddKeysResponse>>)> {
    let resp = inventory_service::add_keys(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    delete,
    path = "/api/inventory/{id}",
    params(("id" = Uuid, Path, description = "Key id")),
    responses(
        (status = 200, description = "Key deleted", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Key already sold"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Inventory"
)]
pub async fn delete_key(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = inventory_service::delete_key(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/inventory/summary",
    responses(
        (status = 200, description = "Available and sold keys per product and platform", body = ApiResponse<StockSummary>)
    ),
    security(("bearer_auth" = [])),
    tag = "Inventory"
)]
pub async fn summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<StockSummary>>> {
    let resp = inventory_service::summary(&state, &user).await?;
    Ok(Json(resp))
}
