use std::collections::{BTreeMap, HashMap};

use chrono::{TimeZone, Utc};
use game_key_store::{
    config::VnpayConfig,
    vnpay::{self, CallbackResult, PaymentRequest},
};

const SECRET: &str = "SECRETKEY";

fn config() -> VnpayConfig {
    VnpayConfig {
        tmn_code: "DEMO0001".into(),
        hash_secret: SECRET.into(),
        pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
        return_url: "http://localhost:5173/payment/result".into(),
    }
}

fn payment_params() -> HashMap<String, String> {
    let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let url = vnpay::build_payment_url(
        &config(),
        &PaymentRequest {
            txn_ref: "GK20240101000000ABCDEF12",
            amount: 150_000,
            order_info: "Thanh toan don hang #1/2",
            ip_addr: "10.0.0.1",
            bank_code: Some("NCB"),
            locale: None,
            created_at,
        },
    )
    .expect("amount fits");
    url::Url::parse(&url)
        .expect("valid url")
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[test]
fn sign_matches_reference_hmac_sha512() {
    assert_eq!(
        vnpay::sign(SECRET, "vnp_Amount=10000000&vnp_TxnRef=GK1"),
        "e7b84859a1ab6cc24eff40bf7640500f71d489564536721e14c48fb220f4b5417c4e67c4a7da3c7213554242ac970fa2c3abdd0af19828b4b3e8575721cd8e8f"
    );
}

#[test]
fn query_is_sorted_and_form_encoded() {
    let mut params = BTreeMap::new();
    params.insert("vnp_OrderInfo".to_string(), "Thanh toan don hang #1/2".to_string());
    params.insert("vnp_Amount".to_string(), "100".to_string());

    assert_eq!(
        vnpay::build_query(&params),
        "vnp_Amount=100&vnp_OrderInfo=Thanh+toan+don+hang+%231%2F2"
    );
}

#[test]
fn timestamps_are_gmt_plus_7() {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 20, 30, 5).unwrap();
    assert_eq!(vnpay::format_timestamp(at), "20240102033005");
}

#[test]
fn payment_url_carries_required_fields() {
    let params = payment_params();

    assert_eq!(params["vnp_Version"], "2.1.0");
    assert_eq!(params["vnp_Command"], "pay");
    assert_eq!(params["vnp_TmnCode"], "DEMO0001");
    assert_eq!(params["vnp_Locale"], "vn");
    assert_eq!(params["vnp_CurrCode"], "VND");
    assert_eq!(params["vnp_OrderType"], "other");
    assert_eq!(params["vnp_Amount"], "15000000");
    assert_eq!(params["vnp_BankCode"], "NCB");
    assert_eq!(params["vnp_IpAddr"], "10.0.0.1");
    assert_eq!(params["vnp_CreateDate"], "20240101070000");
    assert_eq!(params["vnp_ExpireDate"], "20240101071500");
    assert_eq!(params["vnp_OrderInfo"], "Thanh toan don hang #1/2");
    assert!(params.contains_key("vnp_SecureHash"));
}

#[test]
fn signed_url_verifies_and_tampering_is_detected() {
    let mut params = payment_params();
    assert!(vnpay::verify(SECRET, &params));
    assert!(!vnpay::verify("OTHERKEY", &params));

    // The hash type and non-vnp params are not part of the signature.
    params.insert("vnp_SecureHashType".into(), "HmacSHA512".into());
    params.insert("utm_source".into(), "mail".into());
    assert!(vnpay::verify(SECRET, &params));

    let upper = params["vnp_SecureHash"].to_uppercase();
    params.insert("vnp_SecureHash".into(), upper);
    assert!(vnpay::verify(SECRET, &params));

    params.insert("vnp_Amount".into(), "1".into());
    assert!(!vnpay::verify(SECRET, &params));

    params.remove("vnp_SecureHash");
    assert!(!vnpay::verify(SECRET, &params));
}

#[test]
fn callback_result_reads_outcome() {
    let mut params = HashMap::new();
    params.insert("vnp_TxnRef".to_string(), "GK1".to_string());
    params.insert("vnp_Amount".to_string(), "15000000".to_string());
    params.insert("vnp_ResponseCode".to_string(), "00".to_string());
    params.insert("vnp_TransactionStatus".to_string(), "00".to_string());

    let result = CallbackResult::from_params(&params).expect("complete params");
    assert!(result.is_success());
    assert!(result.matches_total(150_000));
    assert!(!result.matches_total(150_001));

    params.insert("vnp_ResponseCode".to_string(), "24".to_string());
    let cancelled = CallbackResult::from_params(&params).unwrap();
    assert!(!cancelled.is_success());

    params.insert("vnp_ResponseCode".to_string(), "00".to_string());
    params.insert("vnp_TransactionStatus".to_string(), "02".to_string());
    assert!(!CallbackResult::from_params(&params).unwrap().is_success());

    // Both codes must be present and "00".
    params.remove("vnp_TransactionStatus");
    assert!(!CallbackResult::from_params(&params).unwrap().is_success());

    params.remove("vnp_Amount");
    assert!(CallbackResult::from_params(&params).is_none());
}

#[test]
fn oversized_amounts_are_rejected_not_wrapped() {
    assert_eq!(vnpay::gateway_amount(150_000), Some(15_000_000));
    assert_eq!(vnpay::gateway_amount(i64::MAX), None);

    let result = CallbackResult {
        txn_ref: "GK1".into(),
        raw_amount: i64::MAX,
        response_code: "00".into(),
        transaction_status: Some("00".into()),
    };
    assert!(!result.matches_total(i64::MAX));

    let request = PaymentRequest {
        txn_ref: "GK1",
        amount: i64::MAX / 10,
        order_info: "x",
        ip_addr: "127.0.0.1",
        bank_code: None,
        locale: None,
        created_at: Utc::now(),
    };
    assert!(vnpay::build_payment_url(&config(), &request).is_none());
}
