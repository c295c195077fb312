use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::reports::{LowStockList, PlatformSalesList, RevenueReport, StatsOverview, TopProductList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::{LowStockQuery, RevenueQuery, TopProductsQuery},
    services::report_service,
    state::AppState,
};

pub fn stats_router() -> Router<AppState> {
    Router::new()
        .route("/overview", get(overview))
        .route("/low-stock", get(low_stock))
}

pub fn reports_router() -> Router<AppState> {
    Router::new()
        .route("/revenue", get(revenue))
        .route("/top-products", get(top_products))
        .route("/sales-by-platform", get(sales_by_platform))
}

#[utoipa::path(
    get,
    path = "/api/stats/overview",
    responses(
        (status = 200, description = "Store totals", body = ApiResponse<StatsOverview>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Stats"
)]
pub async fn overview(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<StatsOverview>>> {
    Ok(Json(report_service::overview(&state, &user).await?))
}

#[utoipa::path(
    get,
    path = "/api/stats/low-stock",
    params(LowStockQuery),
    responses(
        (status = 200, description = "Product/platform pairs running out of keys", body = ApiResponse<LowStockList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Stats"
)]
pub async fn low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<LowStockList>>> {
    Ok(Json(report_service::low_stock(&state, &user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/reports/revenue",
    params(RevenueQuery),
    responses(
        (status = 200, description = "Revenue per day or month", body = ApiResponse<RevenueReport>),
        (status = 400, description = "Invalid date range")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn revenue(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RevenueQuery>,
) -> AppResult<Json<ApiResponse<RevenueReport>>> {
    Ok(Json(report_service::revenue(&state, &user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/reports/top-products",
    params(TopProductsQuery),
    responses(
        (status = 200, description = "Best sellers by units", body = ApiResponse<TopProductList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn top_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<TopProductsQuery>,
) -> AppResult<Json<ApiResponse<TopProductList>>> {
    Ok(Json(report_service::top_products(&state, &user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/reports/sales-by-platform",
    responses(
        (status = 200, description = "Units and revenue per platform", body = ApiResponse<PlatformSalesList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn sales_by_platform(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<PlatformSalesList>>> {
    Ok(Json(report_service::sales_by_platform(&state, &user).await?))
}
