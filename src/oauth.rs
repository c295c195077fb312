//! Google sign-in over OAuth2.
//!
//! The CSRF `state` is a short-lived HS256 token signed with the JWT secret,
//! so the callback can be checked without a server-side session.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    config::GoogleConfig,
    error::{AppError, AppResult},
};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const STATE_PURPOSE: &str = "google_oauth";

pub type GoogleOAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Profile fields returned by Google's userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OAuthState {
    purpose: String,
    nonce: String,
    exp: usize,
}

pub fn build_google_client(config: &GoogleConfig) -> anyhow::Result<GoogleOAuthClient> {
    let client = BasicClient::new(ClientId::new(config.client_id.clone()))
        .set_client_secret(ClientSecret::new(config.client_secret.clone()))
        .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string())?)
        .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URL.to_string())?)
        .set_redirect_uri(RedirectUrl::new(config.redirect_url.clone())?);
    Ok(client)
}

/// Builds the consent-screen URL carrying a signed state token.
pub fn authorize_url(client: &GoogleOAuthClient, jwt_secret: &str) -> AppResult<Url> {
    let state = issue_state(jwt_secret)?;
    let (url, _csrf) = client
        .authorize_url(|| CsrfToken::new(state))
        .add_scope(Scope::new("openid".to_string()))
        .add_scope(Scope::new("email".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .url();
    Ok(url)
}

pub fn issue_state(jwt_secret: &str) -> AppResult<String> {
    let claims = OAuthState {
        purpose: STATE_PURPOSE.to_string(),
        nonce: CsrfToken::new_random().secret().clone(),
        exp: (Utc::now() + Duration::minutes(10)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_state(jwt_secret: &str, state: &str) -> bool {
    decode::<OAuthState>(
        state,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims.purpose == STATE_PURPOSE)
    .unwrap_or(false)
}

/// Trades the authorization code for a token and loads the Google profile.
pub async fn fetch_profile(
    client: &GoogleOAuthClient,
    http_client: &reqwest::Client,
    code: String,
) -> AppResult<GoogleProfile> {
    let token = client
        .exchange_code(AuthorizationCode::new(code))
        .request_async(http_client)
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "google token exchange failed");
            AppError::BadRequest("Google sign-in failed".into())
        })?;

    let profile = http_client
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(token.access_token().secret())
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?
        .json::<GoogleProfile>()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    Ok(profile)
}
