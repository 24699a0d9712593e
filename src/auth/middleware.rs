use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, ImportTrigger};
use crate::auth::session::{resolve_session, SESSION_COOKIE};
use crate::error::AppError;

/// Header carrying the shared service token for machine callers.
pub const SERVICE_TOKEN_HEADER: &str = "x-service-token";

/// Extractor for handlers that require a logged-in user.
///
/// Rejects with `401` when the session cookie is missing, unknown or expired.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthenticatedUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| AppError::Auth("Not logged in".into()))?;

        let user = resolve_session(
            state.session_repo.as_ref(),
            state.user_repo.as_ref(),
            &token,
            chrono::Utc::now(),
        )
        .await?;

        Ok(CurrentUser(user))
    }
}

/// `Option<CurrentUser>` for public routes that personalise output when logged in.
///
/// A missing or stale session yields `None`; storage failures still reject.
impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match <CurrentUser as FromRequestParts<AppState>>::from_request_parts(parts, state).await {
            Ok(user) => Ok(Some(user)),
            Err(AppError::Auth(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Extractor for the news import endpoint: a session user or the service token.
#[derive(Debug, Clone)]
pub struct ImportCaller(pub ImportTrigger);

impl FromRequestParts<AppState> for ImportCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(header) = parts.headers.get(SERVICE_TOKEN_HEADER) {
            let presented = header
                .to_str()
                .map_err(|_| AppError::Auth("Invalid service token".into()))?;
            match state.service_token.as_deref() {
                Some(expected) if presented == expected => {}
                _ => return Err(AppError::Auth("Invalid service token".into())),
            }
            return Ok(ImportCaller(ImportTrigger::Service));
        }

        let CurrentUser(user) =
            <CurrentUser as FromRequestParts<AppState>>::from_request_parts(parts, state).await?;
        Ok(ImportCaller(ImportTrigger::User(user.username)))
    }
}
