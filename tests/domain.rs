use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use chrono::{Duration, NaiveDate, Utc};
use game_key_store::{
    config::{AppConfig, VnpayConfig},
    dto::orders::OrderLineRequest,
    entity::users::Model as UserModel,
    error::{self, AppError},
    middleware::auth::{AuthUser, decode_token, ensure_admin},
    models::{MAX_PRICE, OrderStatus, Role, discounted_price},
    oauth,
    routes::{params::Pagination, payment::client_ip},
    services::{
        auth_service::{
            MAX_PIN_ATTEMPTS, generate_pin, hash_password, issue_token, normalize_email,
            pin_matches, validate_password, verify_password,
        },
        inventory_service::normalize_keys,
        order_service::{MAX_LINE_QUANTITY, build_payment_ref, merge_lines},
        product_service::validate_pricing,
        report_service::report_window,
        upload_service::{image_extension, stored_name},
    },
};
use uuid::Uuid;

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/unused".into(),
        host: "127.0.0.1".into(),
        port: 3000,
        app_env: "test".into(),
        jwt_secret: "test-secret".into(),
        jwt_ttl_hours: 1,
        frontend_url: "http://localhost:5173".into(),
        public_base_url: "http://localhost:3000".into(),
        upload_dir: "uploads".into(),
        upload_max_bytes: 1024,
        smtp: None,
        google: None,
        vnpay: VnpayConfig {
            tmn_code: "DEMO".into(),
            hash_secret: "secret".into(),
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
            return_url: "http://localhost:5173/payment/result".into(),
        },
    }
}

fn user_with_pin(pin: Option<&str>, expires_in: Duration) -> UserModel {
    let now = Utc::now();
    UserModel {
        id: Uuid::new_v4(),
        username: "player".into(),
        email: "player@example.com".into(),
        password_hash: None,
        role: Role::User.as_str().into(),
        is_verified: false,
        verification_pin: pin.map(str::to_string),
        pin_expires_at: Some((now + expires_in).fixed_offset()),
        pin_attempts: 0,
        google_id: None,
        avatar_url: None,
        created_at: now.fixed_offset(),
        updated_at: now.fixed_offset(),
    }
}

fn line(product_id: Uuid, platform_id: Uuid, quantity: i32) -> OrderLineRequest {
    OrderLineRequest {
        product_id,
        platform_id,
        quantity,
    }
}

#[test]
fn pagination_defaults_and_clamps() {
    assert_eq!(Pagination::new(None, None).normalize(), (1, 20, 0));
    assert_eq!(Pagination::new(Some(3), Some(10)).normalize(), (3, 10, 20));
    assert_eq!(Pagination::new(Some(0), Some(500)).normalize(), (1, 100, 0));
    assert_eq!(Pagination::new(Some(-4), Some(0)).normalize(), (1, 1, 0));
}

#[test]
fn huge_page_numbers_saturate() {
    let (page, per_page, offset) = Pagination::new(Some(i64::MAX), Some(100)).normalize();
    assert_eq!(page, i64::MAX);
    assert_eq!(per_page, 100);
    assert_eq!(offset, i64::MAX);
}

#[test]
fn order_status_machine() {
    use OrderStatus::*;

    assert!(Pending.can_transition_to(Paid));
    assert!(Pending.can_transition_to(Failed));
    assert!(Pending.can_transition_to(Cancelled));
    assert!(Paid.can_transition_to(Completed));

    assert!(!Pending.can_transition_to(Completed));
    assert!(!Paid.can_transition_to(Cancelled));
    assert!(!Completed.can_transition_to(Pending));
    assert!(!Failed.can_transition_to(Paid));
    assert!(!Cancelled.can_transition_to(Pending));

    assert!(Failed.releases_keys() && Cancelled.releases_keys());
    assert!(!Paid.releases_keys());
    assert!(Paid.reveals_keys() && Completed.reveals_keys());
    assert!(!Pending.reveals_keys());

    for status in OrderStatus::ALL {
        assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
    }
    assert!("shipped".parse::<OrderStatus>().is_err());
}

#[test]
fn discount_rounds_down_and_clamps() {
    assert_eq!(discounted_price(100_000, 0), 100_000);
    assert_eq!(discounted_price(100_000, 25), 75_000);
    assert_eq!(discounted_price(99_999, 10), 89_999);
    assert_eq!(discounted_price(50_000, 100), 0);
    assert_eq!(discounted_price(50_000, 150), 0);
    assert_eq!(discounted_price(50_000, -5), 50_000);
}

#[test]
fn prices_are_bounded() {
    assert_eq!(discounted_price(i64::MAX, 0), i64::MAX);
    assert_eq!(discounted_price(100_000_000_000_000_000, 50), 50_000_000_000_000_000);

    assert!(validate_pricing(0, 0).is_ok());
    assert!(validate_pricing(MAX_PRICE, 100).is_ok());
    assert!(matches!(validate_pricing(-1, 0), Err(AppError::BadRequest(_))));
    assert!(matches!(
        validate_pricing(MAX_PRICE + 1, 0),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(validate_pricing(1000, 101), Err(AppError::BadRequest(_))));
}

#[test]
fn order_lines_are_merged_and_validated() {
    let (p1, p2, steam) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let merged = merge_lines(vec![line(p1, steam, 1), line(p2, steam, 2), line(p1, steam, 3)])
        .expect("valid lines");
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].product_id, p1);
    assert_eq!(merged[0].quantity, 4);
    assert_eq!(merged[1].quantity, 2);

    assert!(matches!(merge_lines(vec![]), Err(AppError::BadRequest(_))));
    assert!(matches!(
        merge_lines(vec![line(p1, steam, 0)]),
        Err(AppError::BadRequest(_))
    ));
}

#[test]
fn line_quantity_is_capped() {
    let (product, steam) = (Uuid::new_v4(), Uuid::new_v4());

    assert!(merge_lines(vec![line(product, steam, MAX_LINE_QUANTITY)]).is_ok());
    assert!(matches!(
        merge_lines(vec![line(product, steam, 2_000_000_000)]),
        Err(AppError::BadRequest(_))
    ));
    // The cap applies after merging.
    assert!(matches!(
        merge_lines(vec![
            line(product, steam, MAX_LINE_QUANTITY),
            line(product, steam, 1)
        ]),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        merge_lines(vec![line(product, steam, i32::MAX), line(product, steam, 1)]),
        Err(AppError::BadRequest(_))
    ));
}

#[test]
fn payment_ref_is_alphanumeric() {
    let reference = build_payment_ref(Uuid::new_v4());
    assert!(reference.starts_with("GK"));
    assert_eq!(reference.len(), 2 + 14 + 8);
    assert!(reference.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[test]
fn keys_are_trimmed_and_deduplicated() {
    let keys = normalize_keys(vec![
        " AAAA-1 ".into(),
        "".into(),
        "BBBB-2".into(),
        "AAAA-1".into(),
        "   ".into(),
    ]);
    assert_eq!(keys, vec!["AAAA-1".to_string(), "BBBB-2".to_string()]);
}

#[test]
fn only_images_are_accepted() {
    assert_eq!(image_extension("cover.PNG").unwrap(), "png");
    assert_eq!(image_extension("a.b.webp").unwrap(), "webp");
    assert!(image_extension("script.js").is_err());
    assert!(image_extension("noext").is_err());

    let name = stored_name("jpg");
    assert!(name.ends_with(".jpg"));
    assert!(Uuid::parse_str(name.trim_end_matches(".jpg")).is_ok());
}

#[test]
fn report_window_defaults_to_last_30_days() {
    let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    let (from, to) = report_window(None, None, today).unwrap();
    assert_eq!(to, NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());
    assert_eq!(from, NaiveDate::from_ymd_opt(2024, 2, 15).unwrap());

    let explicit_to = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    let (from, _) = report_window(None, Some(explicit_to), today).unwrap();
    assert_eq!(from, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    assert!(report_window(Some(today), Some(today), today).is_err());
}

#[test]
fn pins_are_six_digits_and_expire() {
    for _ in 0..50 {
        let pin = generate_pin();
        assert_eq!(pin.len(), 6);
        assert!(pin.chars().all(|c| c.is_ascii_digit()));
    }

    let fresh = user_with_pin(Some("123456"), Duration::minutes(10));
    assert!(pin_matches(&fresh, "123456"));
    assert!(pin_matches(&fresh, " 123456 "));
    assert!(!pin_matches(&fresh, "654321"));

    let expired = user_with_pin(Some("123456"), Duration::minutes(-1));
    assert!(!pin_matches(&expired, "123456"));

    let cleared = user_with_pin(None, Duration::minutes(10));
    assert!(!pin_matches(&cleared, ""));
}

#[test]
fn pin_stops_matching_after_too_many_misses() {
    let mut user = user_with_pin(Some("123456"), Duration::minutes(10));
    user.pin_attempts = MAX_PIN_ATTEMPTS - 1;
    assert!(pin_matches(&user, "123456"));

    user.pin_attempts = MAX_PIN_ATTEMPTS;
    assert!(!pin_matches(&user, "123456"));
}

#[test]
fn passwords_hash_and_verify() {
    assert!(validate_password("12345").is_err());
    assert!(validate_password("123456").is_ok());

    let hash = hash_password("hunter22").unwrap();
    assert!(verify_password("hunter22", &hash).unwrap());
    assert!(!verify_password("hunter23", &hash).unwrap());

    assert_eq!(normalize_email("  Player@Example.COM "), "player@example.com");
}

#[test]
fn issued_token_decodes_to_the_same_user() {
    let config = test_config();
    let mut user = user_with_pin(None, Duration::zero());
    user.role = Role::Admin.as_str().into();

    let token = issue_token(&config, &user).unwrap();
    let auth = decode_token(&token, &config.jwt_secret).unwrap();
    assert_eq!(auth.user_id, user.id);
    assert!(auth.is_admin());
    assert!(ensure_admin(&auth).is_ok());

    assert!(matches!(
        decode_token(&token, "wrong-secret"),
        Err(AppError::Unauthorized(_))
    ));

    let player = AuthUser {
        user_id: Uuid::new_v4(),
        role: Role::User.as_str().into(),
    };
    assert!(matches!(ensure_admin(&player), Err(AppError::Forbidden)));
}

#[test]
fn oauth_state_is_signed() {
    let state = oauth::issue_state("secret").unwrap();
    assert!(oauth::verify_state("secret", &state));
    assert!(!oauth::verify_state("other", &state));
    assert!(!oauth::verify_state("secret", "not-a-token"));
}

#[test]
fn client_ip_prefers_forwarded_header() {
    let mut headers = HeaderMap::new();
    assert_eq!(client_ip(&headers), "127.0.0.1");

    headers.insert("x-real-ip", HeaderValue::from_static("10.1.1.1"));
    assert_eq!(client_ip(&headers), "10.1.1.1");

    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_static("203.0.113.7, 10.0.0.2"),
    );
    assert_eq!(client_ip(&headers), "203.0.113.7");
}

#[test]
fn errors_map_to_status_codes() {
    let cases = [
        (AppError::NotFound, StatusCode::NOT_FOUND),
        (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
        (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
        (AppError::Forbidden, StatusCode::FORBIDDEN),
        (AppError::Conflict("x".into()), StatusCode::CONFLICT),
        (
            AppError::Internal(anyhow::anyhow!("boom")),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];
    for (error, status) in cases {
        assert_eq!(error.into_response().status(), status);
    }

    assert_eq!(
        AppError::Conflict("Platform already exists".into()).public_message(),
        "Platform already exists"
    );
    assert_eq!(
        AppError::Internal(anyhow::anyhow!("secret cause")).public_message(),
        "Internal Server Error"
    );
}

#[tokio::test]
async fn error_detail_follows_the_startup_switch() -> anyhow::Result<()> {
    async fn detail_of(error: AppError) -> anyhow::Result<serde_json::Value> {
        let body = axum::body::to_bytes(error.into_response().into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        Ok(json["data"]["detail"].clone())
    }

    error::set_error_detail(true);
    assert!(detail_of(AppError::NotFound).await?.is_string());

    error::set_error_detail(false);
    assert!(detail_of(AppError::NotFound).await?.is_null());

    let mut config = test_config();
    config.app_env = "production".into();
    assert!(config.is_production());
    Ok(())
}
