use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QuerySelect, TransactionTrait};

use crate::{
    audit,
    dto::payment::{CreatePaymentUrlRequest, PaymentReturnResponse, PaymentUrlResponse},
    entity::orders::{Column as OrderCol, Entity as Orders, Model as OrderModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{OrderStatus, PaymentMethod},
    response::{ApiResponse, Meta},
    services::order_service::{deliver_keys, parse_status, transition_order},
    state::AppState,
    vnpay::{self, CallbackResult, IpnResponse, PaymentRequest, rsp},
};

pub async fn create_payment_url(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePaymentUrlRequest,
    ip_addr: &str,
) -> AppResult<ApiResponse<PaymentUrlResponse>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(payload.order_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if parse_status(&order)? != OrderStatus::Pending {
        return Err(AppError::BadRequest("Order is not awaiting payment".into()));
    }
    if order.payment_method != PaymentMethod::Vnpay.as_str() {
        return Err(AppError::BadRequest(
            "Order is not paid through VNPay".into(),
        ));
    }

    let order_info = format!("Thanh toan don hang {}", order.payment_ref);
    let request = PaymentRequest {
        txn_ref: &order.payment_ref,
        amount: order.total_price,
        order_info: &order_info,
        ip_addr,
        bank_code: payload.bank_code.as_deref().filter(|c| !c.is_empty()),
        locale: payload.locale.as_deref().filter(|l| !l.is_empty()),
        created_at: Utc::now(),
    };
    let payment_url = vnpay::build_payment_url(&state.config.vnpay, &request).ok_or_else(|| {
        AppError::BadRequest("Order total cannot be paid through VNPay".into())
    })?;

    tracing::info!(order_id = %order.id, payment_ref = %order.payment_ref, "payment url issued");

    Ok(ApiResponse::success(
        "Payment URL created",
        PaymentUrlResponse {
            payment_url,
            payment_ref: order.payment_ref,
        },
        Some(Meta::empty()),
    ))
}

/// What applying a gateway callback did to the order.
#[derive(Debug)]
pub enum Settlement {
    OrderNotFound,
    AmountMismatch,
    /// The order had already left `pending`; nothing changed.
    AlreadyConfirmed(OrderModel),
    Applied(OrderModel),
}

/// Moves the order named by `result` to `paid` or `failed`. Safe to call
/// repeatedly: only a pending order is changed.
pub async fn settle(state: &AppState, result: &CallbackResult) -> AppResult<Settlement> {
    let txn = state.orm.begin().await?;

    let Some(order) = Orders::find()
        .filter(OrderCol::PaymentRef.eq(result.txn_ref.as_str()))
        .lock(LockType::Update)
        .one(&txn)
        .await?
    else {
        return Ok(Settlement::OrderNotFound);
    };

    if !result.matches_total(order.total_price) {
        tracing::warn!(
            order_id = %order.id,
            expected = ?vnpay::gateway_amount(order.total_price),
            received = result.raw_amount,
            "payment amount mismatch"
        );
        return Ok(Settlement::AmountMismatch);
    }

    if parse_status(&order)? != OrderStatus::Pending {
        return Ok(Settlement::AlreadyConfirmed(order));
    }

    let next = if result.is_success() {
        OrderStatus::Paid
    } else {
        OrderStatus::Failed
    };
    let order = transition_order(&txn, order, next).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(order.user_id),
        if next == OrderStatus::Paid {
            "payment_success"
        } else {
            "payment_failed"
        },
        "orders",
        serde_json::json!({
            "order_id": order.id,
            "payment_ref": order.payment_ref,
            "response_code": result.response_code,
        }),
    )
    .await;

    if next == OrderStatus::Paid {
        deliver_keys(state, &order).await;
    }

    Ok(Settlement::Applied(order))
}

/// Server-to-server notification. Always answers in VNPay's own format.
pub async fn handle_ipn(state: &AppState, params: HashMap<String, String>) -> IpnResponse {
    if !vnpay::verify(&state.config.vnpay.hash_secret, &params) {
        tracing::warn!("vnpay ipn with invalid checksum");
        return IpnResponse::new(rsp::INVALID_CHECKSUM, "Invalid Checksum");
    }

    let Some(result) = CallbackResult::from_params(&params) else {
        return IpnResponse::new(rsp::UNKNOWN_ERROR, "Missing parameters");
    };

    match settle(state, &result).await {
        Ok(Settlement::OrderNotFound) => IpnResponse::new(rsp::ORDER_NOT_FOUND, "Order not found"),
        Ok(Settlement::AmountMismatch) => IpnResponse::new(rsp::INVALID_AMOUNT, "Invalid amount"),
        Ok(Settlement::AlreadyConfirmed(_)) => {
            IpnResponse::new(rsp::ALREADY_CONFIRMED, "Order already confirmed")
        }
        Ok(Settlement::Applied(_)) => IpnResponse::new(rsp::SUCCESS, "Confirm Success"),
        Err(err) => {
            tracing::error!(error = ?err, txn_ref = %result.txn_ref, "vnpay ipn failed");
            IpnResponse::new(rsp::UNKNOWN_ERROR, "Unknown error")
        }
    }
}

/// Browser return after checkout on the gateway.
pub async fn handle_return(
    state: &AppState,
    params: HashMap<String, String>,
) -> AppResult<ApiResponse<PaymentReturnResponse>> {
    if !vnpay::verify(&state.config.vnpay.hash_secret, &params) {
        return Err(AppError::BadRequest("Invalid payment signature".into()));
    }
    let result = CallbackResult::from_params(&params)
        .ok_or_else(|| AppError::BadRequest("Missing payment parameters".into()))?;

    let order = match settle(state, &result).await? {
        Settlement::OrderNotFound => return Err(AppError::NotFound),
        Settlement::AmountMismatch => {
            return Err(AppError::BadRequest("Payment amount does not match".into()));
        }
        Settlement::AlreadyConfirmed(order) | Settlement::Applied(order) => order,
    };

    let status = parse_status(&order)?;
    let data = PaymentReturnResponse {
        code: result.response_code.clone(),
        success: result.is_success() && status.reveals_keys(),
        order_id: Some(order.id),
        status: Some(status.as_str().to_string()),
    };
    let message = if data.success {
        "Payment successful"
    } else {
        "Payment failed"
    };
    Ok(ApiResponse::success(message, data, Some(Meta::empty())))
}
