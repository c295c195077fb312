use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    dto::auth::{
        EmailRequest, GoogleCallbackQuery, LoginRequest, LoginResponse, RegisterRequest,
        ResetPasswordRequest, VerifyEmailRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email", post(verify_email))
        .route("/resend-pin", post(resend_pin))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/google", get(google_login))
        .route("/google/callback", get(google_callback))
        .route("/me", get(me))
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification PIN sent", body = ApiResponse<User>),
        (status = 400, description = "Invalid input or email already registered")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let resp = auth_service::register_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = ApiResponse<User>),
        (status = 400, description = "Invalid or expired PIN")
    ),
    tag = "Auth"
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = auth_service::verify_email(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-pin",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "New PIN sent", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Already verified"),
        (status = 404, description = "Unknown email")
    ),
    tag = "Auth"
)]
pub async fn resend_pin(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::resend_pin(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login user", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid credentials"),
        (status = 403, description = "Email not verified")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = auth_service::login_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset PIN sent if the account exists", body = ApiResponse<serde_json::Value>)
    ),
    tag = "Auth"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::forgot_password(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid or expired PIN")
    ),
    tag = "Auth"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::reset_password(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/auth/google",
    responses(
        (status = 302, description = "Redirect to Google consent screen"),
        (status = 400, description = "Google sign-in not configured")
    ),
    tag = "Auth"
)]
pub async fn google_login(State(state): State<AppState>) -> AppResult<Response> {
    let url = auth_service::google_login_url(&state)?;
    Ok(found(&url))
}

#[utoipa::path(
    get,
    path = "/api/auth/google/callback",
    params(GoogleCallbackQuery),
    responses(
        (status = 302, description = "Redirect to the frontend with a token or an error")
    ),
    tag = "Auth"
)]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
) -> Response {
    let frontend = state.config.frontend_url.trim_end_matches('/').to_string();
    let failure = |reason: &str| found(&format!("{frontend}/login?error={reason}"));

    if let Some(error) = query.error {
        tracing::warn!(error = %error, "google sign-in denied");
        return failure("oauth_denied");
    }
    let (Some(code), Some(csrf_state)) = (query.code, query.state) else {
        return failure("oauth_failed");
    };

    match auth_service::google_callback(&state, code, &csrf_state).await {
        Ok(token) => found(&format!(
            "{frontend}/oauth-success?token={}",
            urlencoding::encode(&token)
        )),
        Err(err) => {
            tracing::warn!(error = ?err, "google sign-in failed");
            failure("oauth_failed")
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<User>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = auth_service::current_user(&state, &user).await?;
    Ok(Json(resp))
}
