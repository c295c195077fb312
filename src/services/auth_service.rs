use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    config::AppConfig,
    dto::auth::{
        Claims, EmailRequest, LoginRequest, LoginResponse, RegisterRequest, ResetPasswordRequest,
        VerifyEmailRequest,
    },
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Role, User},
    oauth::{self, GoogleProfile},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const PIN_TTL_MINUTES: i64 = 10;
/// Wrong guesses allowed before the PIN is discarded.
pub const MAX_PIN_ATTEMPTS: i32 = 5;
pub const MIN_PASSWORD_LEN: usize = 6;

pub fn generate_pin() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn issue_token(config: &AppConfig, user: &UserModel) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.jwt_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

/// A PIN is accepted when it matches, has not expired and has not been
/// guessed at too often.
pub fn pin_matches(user: &UserModel, pin: &str) -> bool {
    let not_expired = user
        .pin_expires_at
        .is_some_and(|expires| expires.with_timezone(&Utc) > Utc::now());
    not_expired
        && user.pin_attempts < MAX_PIN_ATTEMPTS
        && user.verification_pin.as_deref() == Some(pin.trim())
}

/// Checks `pin` against the stored one. A miss is counted, and the PIN is
/// discarded once `MAX_PIN_ATTEMPTS` misses have been made.
async fn check_pin(state: &AppState, user: UserModel, pin: &str) -> AppResult<UserModel> {
    if pin_matches(&user, pin) {
        return Ok(user);
    }

    if user.verification_pin.is_some() {
        let attempts = user.pin_attempts.saturating_add(1);
        let user_id = user.id;
        let mut active: UserActive = user.into();
        active.pin_attempts = Set(attempts);
        if attempts >= MAX_PIN_ATTEMPTS {
            active.verification_pin = Set(None);
            active.pin_expires_at = Set(None);
            tracing::warn!(user_id = %user_id, "pin discarded after too many attempts");
        }
        active.update(&state.orm).await?;
    }
    Err(AppError::BadRequest("Invalid or expired PIN".into()))
}

async fn find_by_email(state: &AppState, email: &str) -> AppResult<Option<UserModel>> {
    Ok(Users::find()
        .filter(UserCol::Email.eq(normalize_email(email)))
        .one(&state.orm)
        .await?)
}

async fn store_new_pin(state: &AppState, user: UserModel) -> AppResult<(UserModel, String)> {
    let pin = generate_pin();
    let mut active: UserActive = user.into();
    active.verification_pin = Set(Some(pin.clone()));
    active.pin_expires_at = Set(Some((Utc::now() + Duration::minutes(PIN_TTL_MINUTES)).into()));
    active.pin_attempts = Set(0);
    active.updated_at = Set(Utc::now().into());
    let user = active.update(&state.orm).await?;
    Ok((user, pin))
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let username = payload.username.trim().to_string();
    let email = normalize_email(&payload.email);
    if username.is_empty() || email.is_empty() {
        return Err(AppError::BadRequest(
            "Username and email are required".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    validate_password(&payload.password)?;

    if find_by_email(state, &email).await?.is_some() {
        return Err(AppError::BadRequest("Email is already taken".to_string()));
    }

    let pin = generate_pin();
    let now = Utc::now();
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        email: Set(email),
        password_hash: Set(Some(hash_password(&payload.password)?)),
        role: Set(Role::User.as_str().to_string()),
        is_verified: Set(false),
        verification_pin: Set(Some(pin.clone())),
        pin_expires_at: Set(Some((now + Duration::minutes(PIN_TTL_MINUTES)).into())),
        pin_attempts: Set(0),
        google_id: Set(None),
        avatar_url: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = state
        .mailer
        .send_verification_pin(&user.email, &user.username, &pin)
        .await
    {
        tracing::warn!(error = %err, user_id = %user.id, "verification email failed");
    }

    audit::record(
        &state.pool,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "User created, check your email for the verification code",
        User::from(user),
        None,
    ))
}

pub async fn verify_email(
    state: &AppState,
    payload: VerifyEmailRequest,
) -> AppResult<ApiResponse<User>> {
    let user = find_by_email(state, &payload.email)
        .await?
        .ok_or(AppError::NotFound)?;

    if user.is_verified {
        return Err(AppError::BadRequest("Email is already verified".into()));
    }
    let user = check_pin(state, user, &payload.pin).await?;

    let mut active: UserActive = user.into();
    active.is_verified = Set(true);
    active.verification_pin = Set(None);
    active.pin_expires_at = Set(None);
    active.pin_attempts = Set(0);
    active.updated_at = Set(Utc::now().into());
    let user = active.update(&state.orm).await?;

    tracing::info!(user_id = %user.id, "email verified");
    Ok(ApiResponse::success("Email verified", User::from(user), None))
}

pub async fn resend_pin(
    state: &AppState,
    payload: EmailRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let user = find_by_email(state, &payload.email)
        .await?
        .ok_or(AppError::NotFound)?;
    if user.is_verified {
        return Err(AppError::BadRequest("Email is already verified".into()));
    }

    let (user, pin) = store_new_pin(state, user).await?;
    if let Err(err) = state
        .mailer
        .send_verification_pin(&user.email, &user.username, &pin)
        .await
    {
        tracing::warn!(error = %err, user_id = %user.id, "verification email failed");
    }

    Ok(ApiResponse::ok("Verification code sent"))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let user = match find_by_email(state, &email).await? {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    // Google-only accounts have no password to check against.
    let Some(password_hash) = user.password_hash.as_deref() else {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    };
    if !verify_password(&password, password_hash)? {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }
    if !user.is_verified {
        return Err(AppError::Forbidden);
    }

    let token = issue_token(&state.config, &user)?;

    audit::record(
        &state.pool,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token,
            user: User::from(user),
        },
        Some(Meta::empty()),
    ))
}

pub async fn forgot_password(
    state: &AppState,
    payload: EmailRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    // Same answer for unknown emails so accounts cannot be enumerated.
    if let Some(user) = find_by_email(state, &payload.email).await? {
        let (user, pin) = store_new_pin(state, user).await?;
        if let Err(err) = state
            .mailer
            .send_password_reset_pin(&user.email, &user.username, &pin)
            .await
        {
            tracing::warn!(error = %err, user_id = %user.id, "reset email failed");
        }
    }

    Ok(ApiResponse::ok(
        "If the email is registered, a reset code has been sent",
    ))
}

pub async fn reset_password(
    state: &AppState,
    payload: ResetPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    validate_password(&payload.new_password)?;
    let user = find_by_email(state, &payload.email)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired PIN".into()))?;
    let user = check_pin(state, user, &payload.pin).await?;

    let user_id = user.id;
    let mut active: UserActive = user.into();
    active.password_hash = Set(Some(hash_password(&payload.new_password)?));
    active.verification_pin = Set(None);
    active.pin_expires_at = Set(None);
    active.pin_attempts = Set(0);
    // Receiving the PIN proves ownership of the address.
    active.is_verified = Set(true);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user_id),
        "password_reset",
        "users",
        serde_json::json!({ "user_id": user_id }),
    )
    .await;

    Ok(ApiResponse::ok("Password has been reset"))
}

pub fn google_login_url(state: &AppState) -> AppResult<String> {
    let client = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Google sign-in is not configured".into()))?;
    Ok(oauth::authorize_url(client, &state.config.jwt_secret)?.to_string())
}

/// Completes Google sign-in and returns a session token for the linked account.
pub async fn google_callback(state: &AppState, code: String, csrf_state: &str) -> AppResult<String> {
    let client = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Google sign-in is not configured".into()))?;
    if !oauth::verify_state(&state.config.jwt_secret, csrf_state) {
        return Err(AppError::BadRequest("Invalid OAuth state".into()));
    }

    let profile = oauth::fetch_profile(client, &state.http_client, code).await?;
    let user = upsert_google_user(state, profile).await?;
    issue_token(&state.config, &user)
}

/// Finds the account for a Google identity, linking by email or creating one.
/// Only a Google-verified address may be matched to an account by email.
pub async fn upsert_google_user(state: &AppState, profile: GoogleProfile) -> AppResult<UserModel> {
    let email = normalize_email(&profile.email);
    let linked = Users::find()
        .filter(UserCol::GoogleId.eq(profile.sub.clone()))
        .one(&state.orm)
        .await?;

    let existing = match linked {
        Some(user) => Some(user),
        None if !profile.email_verified => {
            tracing::warn!(google_id = %profile.sub, "google sign-in with unverified email refused");
            return Err(AppError::Forbidden);
        }
        None => {
            Users::find()
                .filter(UserCol::Email.eq(email.clone()))
                .one(&state.orm)
                .await?
        }
    };

    let now = Utc::now();
    let user = match existing {
        Some(user) => {
            let mut active: UserActive = user.into();
            active.google_id = Set(Some(profile.sub));
            active.is_verified = Set(true);
            active.verification_pin = Set(None);
            active.pin_expires_at = Set(None);
            active.pin_attempts = Set(0);
            if let Some(picture) = profile.picture {
                active.avatar_url = Set(Some(picture));
            }
            active.updated_at = Set(now.into());
            active.update(&state.orm).await?
        }
        None => {
            let username = profile
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| email.split('@').next().unwrap_or("player").to_string());
            let user = UserActive {
                id: Set(Uuid::new_v4()),
                username: Set(username),
                email: Set(email),
                password_hash: Set(None),
                role: Set(Role::User.as_str().to_string()),
                is_verified: Set(true),
                verification_pin: Set(None),
                pin_expires_at: Set(None),
                pin_attempts: Set(0),
                google_id: Set(Some(profile.sub)),
                avatar_url: Set(profile.picture),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&state.orm)
            .await?;
            audit::record(
                &state.pool,
                Some(user.id),
                "user_register_google",
                "users",
                serde_json::json!({ "user_id": user.id }),
            )
            .await;
            user
        }
    };

    tracing::info!(user_id = %user.id, "google sign-in");
    Ok(user)
}

pub async fn current_user(state: &AppState, auth: &AuthUser) -> AppResult<ApiResponse<User>> {
    let user = Users::find_by_id(auth.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Current user", User::from(user), None))
}
