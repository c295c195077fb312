use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::{config::AppConfig, state::AppState};

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod doc;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod params;
pub mod payment;
pub mod products;
pub mod reports;
pub mod upload;
pub mod users;

/// Limit for JSON endpoints. Uploads carry their own.
pub const JSON_BODY_LIMIT: usize = 1024 * 1024;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router(config: &AppConfig) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/products", products::router())
        .nest("/platforms", catalog::platforms_router())
        .nest("/genres", catalog::genres_router())
        .nest("/inventory", inventory::router())
        .nest("/orders", orders::router())
        .nest("/payment", payment::router())
        .nest("/admin", admin::router())
        .nest("/stats", reports::stats_router())
        .nest("/reports", reports::reports_router())
        .layer(RequestBodyLimitLayer::new(JSON_BODY_LIMIT))
        .nest("/upload", upload::router(config.upload_max_bytes))
}
