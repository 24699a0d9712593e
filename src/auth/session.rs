use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::auth::models::AuthenticatedUser;
use crate::db::models::Session;
use crate::db::session_repository::SessionRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "inkpost_session";

/// Generate a random, URL-safe session token (256 bits).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a session token for storage (SHA-256, lowercase hex). Raw tokens are never persisted.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..])
}

/// Create and persist a session for `user_id`. Returns the raw cookie token.
pub async fn start_session(
    sessions: &dyn SessionRepository,
    user_id: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let token = generate_token();

    sessions
        .insert(Session {
            token_hash: hash_token(&token),
            user_id: user_id.to_string(),
            created_at: now,
            expires_at: now + ttl,
        })
        .await?;

    Ok(token)
}

/// Resolve a raw cookie token to its user.
pub async fn resolve_session(
    sessions: &dyn SessionRepository,
    users: &dyn UserRepository,
    token: &str,
    now: DateTime<Utc>,
) -> Result<AuthenticatedUser, AppError> {
    let session = sessions
        .find_active(&hash_token(token), now)
        .await?
        .ok_or_else(|| AppError::Auth("Session expired or invalid".into()))?;

    let user = users
        .find_by_id(&session.user_id)
        .await?
        .ok_or_else(|| AppError::Auth("Session user no longer exists".into()))?;

    Ok(AuthenticatedUser::from(&user))
}

/// Build the session cookie carrying `token`.
pub fn session_cookie(token: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .build()
}

/// A cookie that clears the session on the client.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .removal()
        .build()
}
