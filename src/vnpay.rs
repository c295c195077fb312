//! VNPay 2.1.0 request signing and callback verification.
//!
//! Parameters are sorted by key, form-encoded (space as `+`) and joined with
//! `&`. The signature is the lowercase hex HMAC-SHA512 of that string.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use utoipa::ToSchema;

use crate::config::VnpayConfig;

type HmacSha512 = Hmac<Sha512>;

pub const VERSION: &str = "2.1.0";
pub const SECURE_HASH: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
/// Payment window granted to the customer on the gateway page.
pub const EXPIRE_MINUTES: i64 = 15;

/// Codes answered to the IPN caller.
pub mod rsp {
    pub const SUCCESS: &str = "00";
    pub const ORDER_NOT_FOUND: &str = "01";
    pub const ALREADY_CONFIRMED: &str = "02";
    pub const INVALID_AMOUNT: &str = "04";
    pub const INVALID_CHECKSUM: &str = "97";
    pub const UNKNOWN_ERROR: &str = "99";
}

#[derive(Debug, Clone)]
pub struct PaymentRequest<'a> {
    pub txn_ref: &'a str,
    pub amount: i64,
    pub order_info: &'a str,
    pub ip_addr: &'a str,
    pub bank_code: Option<&'a str>,
    pub locale: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// Body VNPay expects in reply to an IPN call.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct IpnResponse {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

impl IpnResponse {
    pub fn new(rsp_code: &str, message: &str) -> Self {
        Self {
            rsp_code: rsp_code.to_string(),
            message: message.to_string(),
        }
    }
}

pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

pub fn build_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn sign(secret: &str, data: &str) -> String {
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// VNPay timestamps are wall-clock time in GMT+7.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    let offset = FixedOffset::east_opt(7 * 3600).expect("GMT+7 is a valid offset");
    at.with_timezone(&offset).format("%Y%m%d%H%M%S").to_string()
}

/// VND expressed in the gateway's unit (hundredths), if it fits.
pub fn gateway_amount(amount: i64) -> Option<i64> {
    amount.checked_mul(100)
}

/// Signed checkout URL, or `None` when the amount cannot be sent to the gateway.
pub fn build_payment_url(config: &VnpayConfig, req: &PaymentRequest<'_>) -> Option<String> {
    let amount = gateway_amount(req.amount).filter(|a| *a > 0)?;
    let mut params = BTreeMap::new();
    params.insert("vnp_Version".to_string(), VERSION.to_string());
    params.insert("vnp_Command".to_string(), "pay".to_string());
    params.insert("vnp_TmnCode".to_string(), config.tmn_code.clone());
    params.insert(
        "vnp_Locale".to_string(),
        req.locale.filter(|l| !l.is_empty()).unwrap_or("vn").to_string(),
    );
    params.insert("vnp_CurrCode".to_string(), "VND".to_string());
    params.insert("vnp_TxnRef".to_string(), req.txn_ref.to_string());
    params.insert("vnp_OrderInfo".to_string(), req.order_info.to_string());
    params.insert("vnp_OrderType".to_string(), "other".to_string());
    params.insert("vnp_Amount".to_string(), amount.to_string());
    params.insert("vnp_ReturnUrl".to_string(), config.return_url.clone());
    params.insert("vnp_IpAddr".to_string(), req.ip_addr.to_string());
    params.insert(
        "vnp_CreateDate".to_string(),
        format_timestamp(req.created_at),
    );
    params.insert(
        "vnp_ExpireDate".to_string(),
        format_timestamp(req.created_at + Duration::minutes(EXPIRE_MINUTES)),
    );
    if let Some(bank_code) = req.bank_code.filter(|b| !b.is_empty()) {
        params.insert("vnp_BankCode".to_string(), bank_code.to_string());
    }

    let query = build_query(&params);
    let signature = sign(&config.hash_secret, &query);
    Some(format!("{}?{}&{}={}", config.pay_url, query, SECURE_HASH, signature))
}

/// Checks the signature of a callback. Only `vnp_*` params take part, minus the hash fields.
pub fn verify(secret: &str, params: &HashMap<String, String>) -> bool {
    let Some(received) = params.get(SECURE_HASH) else {
        return false;
    };

    let signed: BTreeMap<String, String> = params
        .iter()
        .filter(|(k, _)| k.starts_with("vnp_") && *k != SECURE_HASH && *k != SECURE_HASH_TYPE)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let expected = sign(secret, &build_query(&signed));
    constant_time_eq(
        expected.as_bytes(),
        received.to_ascii_lowercase().as_bytes(),
    )
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Outcome carried by a verified callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResult {
    pub txn_ref: String,
    /// Amount as sent by VNPay, i.e. VND multiplied by 100.
    pub raw_amount: i64,
    pub response_code: String,
    pub transaction_status: Option<String>,
}

impl CallbackResult {
    pub fn from_params(params: &HashMap<String, String>) -> Option<Self> {
        let txn_ref = params.get("vnp_TxnRef")?.clone();
        let raw_amount = params.get("vnp_Amount")?.parse::<i64>().ok()?;
        Some(Self {
            txn_ref,
            raw_amount,
            response_code: params.get("vnp_ResponseCode").cloned().unwrap_or_default(),
            transaction_status: params.get("vnp_TransactionStatus").cloned(),
        })
    }

    pub fn matches_total(&self, total_price: i64) -> bool {
        gateway_amount(total_price) == Some(self.raw_amount)
    }

    /// The gateway reports success only when both codes are "00".
    pub fn is_success(&self) -> bool {
        self.response_code == rsp::SUCCESS
            && self.transaction_status.as_deref() == Some(rsp::SUCCESS)
    }
}
