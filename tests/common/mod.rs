#![allow(dead_code)]

use chrono::Utc;
use game_key_store::{
    config::{AppConfig, VnpayConfig},
    db::{create_pool, run_migrations},
    entity::users::ActiveModel as UserActive,
    middleware::auth::AuthUser,
    services::auth_service::hash_password,
    state::AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

pub const VNPAY_SECRET: &str = "TESTSECRET";

/// Connection string for integration tests, if one is configured.
pub fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
            None
        }
    }
}

pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        app_env: "test".into(),
        jwt_secret: "integration-secret".into(),
        jwt_ttl_hours: 1,
        frontend_url: "http://localhost:5173".into(),
        public_base_url: "http://localhost:3000".into(),
        upload_dir: std::env::temp_dir()
            .join("game-key-store-uploads")
            .to_string_lossy()
            .into_owned(),
        upload_max_bytes: 1024 * 1024,
        smtp: None,
        google: None,
        vnpay: VnpayConfig {
            tmn_code: "TESTTMN1".into(),
            hash_secret: VNPAY_SECRET.into(),
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
            return_url: "http://localhost:5173/payment/result".into(),
        },
    }
}

/// Fresh state over a migrated, emptied database.
pub async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    run_migrations(&pool).await?;

    sqlx::query(
        "TRUNCATE TABLE audit_logs, wishlists, inventory, order_items, orders, \
         product_genres, product_platforms, products, genres, platforms, users CASCADE",
    )
    .execute(&pool)
    .await?;

    AppState::new(test_config(database_url), pool)
}

/// Inserts a verified account and returns it as an authenticated caller.
pub async fn create_user(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<AuthUser> {
    let now = Utc::now();
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(Some(hash_password(password)?)),
        role: Set(role.to_string()),
        is_verified: Set(true),
        verification_pin: Set(None),
        pin_expires_at: Set(None),
        pin_attempts: Set(0),
        google_id: Set(None),
        avatar_url: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}
