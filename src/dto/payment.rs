use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentUrlRequest {
    pub order_id: Uuid,
    pub bank_code: Option<String>,
    /// `vn` or `en`. Defaults to `vn`.
    pub locale: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentUrlResponse {
    pub payment_url: String,
    pub payment_ref: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentReturnResponse {
    /// VNPay response code, "00" on success.
    pub code: String,
    pub success: bool,
    pub order_id: Option<Uuid>,
    pub status: Option<String>,
}
