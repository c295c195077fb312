mod common;

use game_key_store::{
    dto::{
        auth::{EmailRequest, LoginRequest, RegisterRequest, ResetPasswordRequest, VerifyEmailRequest},
        products::CreateProductRequest,
        users::{AddWishlistRequest, ChangePasswordRequest, UpdateProfileRequest},
    },
    error::AppError,
    middleware::auth::{AuthUser, decode_token},
    oauth::GoogleProfile,
    routes::params::Pagination,
    services::{auth_service, auth_service::MAX_PIN_ATTEMPTS, product_service, user_service},
    state::AppState,
};
use uuid::Uuid;

// Registration with email PIN, login, password reset, then profile and wishlist.
#[tokio::test]
async fn register_verify_login_and_account_flow() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };
    let state = common::setup_state(&database_url).await?;

    let created = auth_service::register_user(
        &state,
        RegisterRequest {
            username: " gamer ".into(),
            email: "Gamer@Example.com".into(),
            password: "secret1".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(created.username, "gamer");
    assert_eq!(created.email, "gamer@example.com");
    assert!(!created.is_verified);

    let taken = auth_service::register_user(
        &state,
        RegisterRequest {
            username: "other".into(),
            email: "gamer@example.com".into(),
            password: "secret1".into(),
        },
    )
    .await;
    assert!(matches!(taken, Err(AppError::BadRequest(_))));

    // Unverified accounts cannot log in.
    assert!(matches!(
        auth_service::login_user(&state, login("gamer@example.com", "secret1")).await,
        Err(AppError::Forbidden)
    ));

    let wrong_pin = auth_service::verify_email(
        &state,
        VerifyEmailRequest {
            email: "gamer@example.com".into(),
            pin: "not-a-pin".into(),
        },
    )
    .await;
    assert!(matches!(wrong_pin, Err(AppError::BadRequest(_))));

    let pin = stored_pin(&state, "gamer@example.com").await?;
    let verified = auth_service::verify_email(
        &state,
        VerifyEmailRequest {
            email: "gamer@example.com".into(),
            pin,
        },
    )
    .await?
    .data
    .unwrap();
    assert!(verified.is_verified);

    assert!(matches!(
        auth_service::login_user(&state, login("gamer@example.com", "wrong-password")).await,
        Err(AppError::BadRequest(_))
    ));
    let session = auth_service::login_user(&state, login("GAMER@example.com", "secret1"))
        .await?
        .data
        .unwrap();
    let auth = decode_token(&session.token, &state.config.jwt_secret)?;
    assert_eq!(auth.user_id, created.id);
    assert_eq!(auth.role, "user");

    // Password reset through an emailed PIN.
    auth_service::forgot_password(
        &state,
        EmailRequest {
            email: "nobody@example.com".into(),
        },
    )
    .await?;
    auth_service::forgot_password(
        &state,
        EmailRequest {
            email: "gamer@example.com".into(),
        },
    )
    .await?;
    let reset_pin = stored_pin(&state, "gamer@example.com").await?;
    auth_service::reset_password(
        &state,
        ResetPasswordRequest {
            email: "gamer@example.com".into(),
            pin: reset_pin.clone(),
            new_password: "brand-new".into(),
        },
    )
    .await?;
    let reused = auth_service::reset_password(
        &state,
        ResetPasswordRequest {
            email: "gamer@example.com".into(),
            pin: reset_pin,
            new_password: "another1".into(),
        },
    )
    .await;
    assert!(matches!(reused, Err(AppError::BadRequest(_))));

    assert!(auth_service::login_user(&state, login("gamer@example.com", "secret1")).await.is_err());
    auth_service::login_user(&state, login("gamer@example.com", "brand-new")).await?;

    account_management(&state, &auth).await?;
    pin_lockout(&state).await?;
    google_sign_in(&state).await
}

async fn pin_lockout(state: &AppState) -> anyhow::Result<()> {
    auth_service::register_user(
        state,
        RegisterRequest {
            username: "guesser".into(),
            email: "guesser@example.com".into(),
            password: "secret1".into(),
        },
    )
    .await?;
    let pin = stored_pin(state, "guesser@example.com").await?;

    for _ in 0..MAX_PIN_ATTEMPTS {
        let guess = auth_service::verify_email(state, verify("guesser@example.com", "000000x")).await;
        assert!(matches!(guess, Err(AppError::BadRequest(_))));
    }

    // The real PIN no longer works once the guesses are used up.
    let late = auth_service::verify_email(state, verify("guesser@example.com", &pin)).await;
    assert!(matches!(late, Err(AppError::BadRequest(_))));
    assert!(stored_pin(state, "guesser@example.com").await.is_err());

    auth_service::resend_pin(
        state,
        EmailRequest {
            email: "guesser@example.com".into(),
        },
    )
    .await?;
    let fresh = stored_pin(state, "guesser@example.com").await?;
    let verified = auth_service::verify_email(state, verify("guesser@example.com", &fresh))
        .await?
        .data
        .unwrap();
    assert!(verified.is_verified);
    Ok(())
}

async fn google_sign_in(state: &AppState) -> anyhow::Result<()> {
    let admin = common::create_user(state, "owner", "owner@example.com", "owner123", "admin").await?;

    // An address Google has not verified cannot claim an existing account.
    let spoofed = auth_service::upsert_google_user(state, google("g-attacker", "Owner@example.com", false)).await;
    assert!(matches!(spoofed, Err(AppError::Forbidden)));
    let (google_id,): (Option<String>,) = sqlx::query_as("SELECT google_id FROM users WHERE id = $1")
        .bind(admin.user_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(google_id, None);

    let linked = auth_service::upsert_google_user(state, google("g-owner", "owner@example.com", true)).await?;
    assert_eq!(linked.id, admin.user_id);
    assert_eq!(linked.google_id.as_deref(), Some("g-owner"));
    assert_eq!(linked.role, "admin");

    // Once linked, the Google id alone identifies the account.
    let again = auth_service::upsert_google_user(state, google("g-owner", "owner@example.com", false)).await?;
    assert_eq!(again.id, admin.user_id);

    let created = auth_service::upsert_google_user(state, google("g-new", "newcomer@example.com", true)).await?;
    assert_ne!(created.id, admin.user_id);
    assert_eq!(created.role, "user");
    assert!(created.is_verified);
    assert!(created.password_hash.is_none());
    Ok(())
}

async fn account_management(state: &AppState, auth: &AuthUser) -> anyhow::Result<()> {
    let profile = user_service::update_profile(
        state,
        auth,
        UpdateProfileRequest {
            username: Some("gamer-pro".into()),
            avatar_url: Some("http://localhost:3000/uploads/a.png".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(profile.username, "gamer-pro");

    let wrong_current = user_service::change_password(
        state,
        auth,
        ChangePasswordRequest {
            current_password: Some("nope".into()),
            new_password: "changed1".into(),
        },
    )
    .await;
    assert!(matches!(wrong_current, Err(AppError::BadRequest(_))));
    user_service::change_password(
        state,
        auth,
        ChangePasswordRequest {
            current_password: Some("brand-new".into()),
            new_password: "changed1".into(),
        },
    )
    .await?;
    auth_service::login_user(state, login("gamer@example.com", "changed1")).await?;

    // Wishlist
    let admin = common::create_user(state, "admin", "admin@example.com", "admin123", "admin").await?;
    let product = product_service::create_product(
        state,
        &admin,
        CreateProductRequest {
            name: "Wishlisted".into(),
            description: None,
            price: 100_000,
            discount_percent: 0,
            image_url: None,
            developer: None,
            publisher: None,
            release_date: None,
            platform_ids: vec![],
            genre_ids: vec![],
        },
    )
    .await?
    .data
    .unwrap();
    let product_id = product.product.id;

    for _ in 0..2 {
        user_service::add_to_wishlist(state, auth, AddWishlistRequest { product_id }).await?;
    }
    assert!(matches!(
        user_service::add_to_wishlist(
            state,
            auth,
            AddWishlistRequest {
                product_id: Uuid::new_v4()
            }
        )
        .await,
        Err(AppError::NotFound)
    ));

    let wishlist = user_service::list_wishlist(state, auth, Pagination::new(None, None)).await?;
    assert_eq!(wishlist.meta.and_then(|m| m.total), Some(1));
    assert_eq!(wishlist.data.unwrap().items[0].id, product_id);

    user_service::remove_from_wishlist(state, auth, product_id).await?;
    assert!(matches!(
        user_service::remove_from_wishlist(state, auth, product_id).await,
        Err(AppError::NotFound)
    ));

    Ok(())
}

fn verify(email: &str, pin: &str) -> VerifyEmailRequest {
    VerifyEmailRequest {
        email: email.to_string(),
        pin: pin.to_string(),
    }
}

fn google(sub: &str, email: &str, email_verified: bool) -> GoogleProfile {
    GoogleProfile {
        sub: sub.to_string(),
        email: email.to_string(),
        email_verified,
        name: Some("Owner".into()),
        picture: None,
    }
}

fn login(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

async fn stored_pin(state: &AppState, email: &str) -> anyhow::Result<String> {
    let (pin,): (Option<String>,) =
        sqlx::query_as("SELECT verification_pin FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&state.pool)
            .await?;
    pin.ok_or_else(|| anyhow::anyhow!("no PIN stored for {email}"))
}
