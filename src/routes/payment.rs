use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
};

use crate::{
    dto::payment::{CreatePaymentUrlRequest, PaymentReturnResponse, PaymentUrlResponse},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
    vnpay::IpnResponse,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create_payment_url", post(create_payment_url))
        .route("/vnpay_ipn", get(vnpay_ipn))
        .route("/vnpay_return", get(vnpay_return))
}

/// First hop of `x-forwarded-for`, then `x-real-ip`, else loopback.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

#[utoipa::path(
    post,
    path = "/api/payment/create_payment_url",
    request_body = CreatePaymentUrlRequest,
    responses(
        (status = 200, description = "Signed VNPay checkout URL", body = ApiResponse<PaymentUrlResponse>),
        (status = 400, description = "Order is not a pending VNPay order"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payment"
)]
pub async fn create_payment_url(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<CreatePaymentUrlRequest>,
) -> AppResult<Json<ApiResponse<PaymentUrlResponse>>> {
    let ip = client_ip(&headers);
    let resp = payment_service::create_payment_url(&state, &user, payload, &ip).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payment/vnpay_ipn",
    responses(
        (status = 200, description = "VNPay acknowledgement {RspCode, Message}", body = IpnResponse)
    ),
    tag = "Payment"
)]
pub async fn vnpay_ipn(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<IpnResponse> {
    Json(payment_service::handle_ipn(&state, params).await)
}

#[utoipa::path(
    get,
    path = "/api/payment/vnpay_return",
    responses(
        (status = 200, description = "Result of the payment", body = ApiResponse<PaymentReturnResponse>),
        (status = 400, description = "Invalid signature or amount"),
        (status = 404, description = "Order not found")
    ),
    tag = "Payment"
)]
pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<ApiResponse<PaymentReturnResponse>>> {
    let resp = payment_service::handle_return(&state, params).await?;
    Ok(Json(resp))
}
