use axum_extra::extract::CookieJar;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::api::notifications::notify;
use crate::auth::middleware::CurrentUser;
use crate::auth::models::AuthenticatedUser;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::session::{
    hash_token, removal_cookie, session_cookie, start_session, SESSION_COOKIE,
};
use crate::db::models::{NotificationKind, ProfileUpdate, User};
use crate::db::notification_repository::NotificationRepository;
use crate::db::session_repository::SessionRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::rendering::mentions::is_username_char;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 30;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_DISPLAY_NAME_LEN: usize = 50;
pub const MAX_BIO_LEN: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Email address or username.
    pub login: String,
    pub password: String,
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub follower_count: usize,
    pub following_count: usize,
    pub created_at: DateTime<Utc>,
    /// Whether the viewer follows this user. Absent for anonymous viewers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
}

impl ProfileView {
    pub fn new(user: &User, viewer_id: Option<&str>) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            display_name: non_empty(&user.display_name),
            bio: non_empty(&user.bio),
            avatar_url: non_empty(&user.avatar_url),
            follower_count: user.followers.len(),
            following_count: user.following.len(),
            created_at: user.created_at,
            is_following: viewer_id.map(|viewer| user.followers.iter().any(|f| f == viewer)),
        }
    }
}

/// The logged-in user's own account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
    pub email: String,
    #[serde(flatten)]
    pub profile: ProfileView,
}

impl From<&User> for AccountView {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            profile: ProfileView::new(user, None),
        }
    }
}

/// A compact entry in follower and following lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            display_name: non_empty(&user.display_name),
            avatar_url: non_empty(&user.avatar_url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowResponse {
    pub following: bool,
    pub follower_count: usize,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

pub fn validate_username(username: &str) -> Result<(), AppError> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len)
        || !username.chars().all(is_username_char)
    {
        return Err(AppError::BadRequest(format!(
            "Username must be {}-{} characters of letters, digits or underscores",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    Ok(())
}

/// Trim and lowercase an email address.
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::BadRequest("Invalid email address".into())),
    }
}

/// Validate a profile edit, trimming each provided field.
pub fn validate_profile(update: ProfileUpdate) -> Result<ProfileUpdate, AppError> {
    let display_name = update.display_name.map(|v| v.trim().to_string());
    if let Some(name) = &display_name {
        if name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(AppError::BadRequest(format!(
                "Display name cannot exceed {} characters",
                MAX_DISPLAY_NAME_LEN
            )));
        }
    }

    let bio = update.bio.map(|v| v.trim().to_string());
    if let Some(bio) = &bio {
        if bio.chars().count() > MAX_BIO_LEN {
            return Err(AppError::BadRequest(format!(
                "Bio cannot exceed {} characters",
                MAX_BIO_LEN
            )));
        }
    }

    let avatar_url = update.avatar_url.map(|v| v.trim().to_string());
    if let Some(avatar) = avatar_url.as_deref().filter(|a| !a.is_empty()) {
        let parsed = url::Url::parse(avatar)
            .map_err(|_| AppError::BadRequest("Avatar URL is not a valid URL".into()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::BadRequest(
                "Avatar URL must use http or https".into(),
            ));
        }
    }

    Ok(ProfileUpdate {
        display_name,
        bio,
        avatar_url,
    })
}

async fn find_user(users: &dyn UserRepository, username: &str) -> Result<User, AppError> {
    users
        .find_by_username(username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))
}

/// Create an account and log it in. Returns the account and the session token.
pub async fn process_register(
    users: &dyn UserRepository,
    sessions: &dyn SessionRepository,
    request: RegisterRequest,
    session_ttl: Duration,
    now: DateTime<Utc>,
) -> Result<(AccountView, String), AppError> {
    let email = normalize_email(&request.email)?;
    let username = request.username.trim().to_lowercase();
    validate_username(&username)?;
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if users.find_by_username(&username).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Username '{}' is already taken",
            username
        )));
    }
    if users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".into()));
    }

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        username,
        password_hash: hash_password(&request.password)?,
        display_name: None,
        bio: None,
        avatar_url: None,
        followers: vec![],
        following: vec![],
        created_at: now,
    };
    users.insert(user.clone()).await?;
    tracing::info!("Registered user '{}'", user.username);

    let token = start_session(sessions, &user.id, session_ttl, now).await?;
    Ok((AccountView::from(&user), token))
}

/// Check credentials and start a session.
pub async fn process_login(
    users: &dyn UserRepository,
    sessions: &dyn SessionRepository,
    request: LoginRequest,
    session_ttl: Duration,
    now: DateTime<Utc>,
) -> Result<(AccountView, String), AppError> {
    let login = request.login.trim();
    let user = if login.contains('@') {
        users.find_by_email(&login.to_lowercase()).await?
    } else {
        users.find_by_username(login).await?
    };

    let invalid = || AppError::Auth("Invalid login or password".into());
    let user = user.ok_or_else(invalid)?;
    if !verify_password(&request.password, &user.password_hash)? {
        return Err(invalid());
    }

    let token = start_session(sessions, &user.id, session_ttl, now).await?;
    tracing::debug!("User '{}' logged in", user.username);
    Ok((AccountView::from(&user), token))
}

pub async fn process_update_profile(
    users: &dyn UserRepository,
    user: &AuthenticatedUser,
    update: ProfileUpdate,
) -> Result<AccountView, AppError> {
    let update = validate_profile(update)?;
    if !users.update_profile(&user.user_id, &update).await? {
        return Err(AppError::Auth("Session user no longer exists".into()));
    }

    let stored = users
        .find_by_id(&user.user_id)
        .await?
        .ok_or_else(|| AppError::Auth("Session user no longer exists".into()))?;
    Ok(AccountView::from(&stored))
}

/// Follow `username`. Only the first follow notifies.
pub async fn process_follow(
    users: &dyn UserRepository,
    notifications: &dyn NotificationRepository,
    user: &AuthenticatedUser,
    username: &str,
) -> Result<FollowResponse, AppError> {
    let target = find_user(users, username).await?;
    if target.id == user.user_id {
        return Err(AppError::BadRequest("You cannot follow yourself".into()));
    }

    if users.follow(&user.user_id, &target.id).await? {
        notify(notifications, &target.id, NotificationKind::Follow, user, None).await;
    }

    let updated = find_user(users, username).await?;
    Ok(FollowResponse {
        following: true,
        follower_count: updated.followers.len(),
    })
}

pub async fn process_unfollow(
    users: &dyn UserRepository,
    user: &AuthenticatedUser,
    username: &str,
) -> Result<FollowResponse, AppError> {
    let target = find_user(users, username).await?;
    if target.id == user.user_id {
        return Err(AppError::BadRequest("You cannot unfollow yourself".into()));
    }

    users.unfollow(&user.user_id, &target.id).await?;

    let updated = find_user(users, username).await?;
    Ok(FollowResponse {
        following: false,
        follower_count: updated.followers.len(),
    })
}

pub async fn process_followers(
    users: &dyn UserRepository,
    username: &str,
) -> Result<Vec<UserSummary>, AppError> {
    let target = find_user(users, username).await?;
    let followers = users.find_by_ids(&target.followers).await?;
    Ok(followers.iter().map(UserSummary::from).collect())
}

pub async fn process_following(
    users: &dyn UserRepository,
    username: &str,
) -> Result<Vec<UserSummary>, AppError> {
    let target = find_user(users, username).await?;
    let following = users.find_by_ids(&target.following).await?;
    Ok(following.iter().map(UserSummary::from).collect())
}

/// Axum handler for `POST /api/auth/register`.
pub async fn register_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    jar: CookieJar,
    axum::Json(request): axum::Json<RegisterRequest>,
) -> Result<(axum::http::StatusCode, CookieJar, axum::Json<AccountView>), AppError> {
    let (account, token) = process_register(
        state.user_repo.as_ref(),
        state.session_repo.as_ref(),
        request,
        state.session_ttl,
        Utc::now(),
    )
    .await?;

    let jar = jar.add(session_cookie(token, state.session_ttl, state.cookie_secure));
    Ok((axum::http::StatusCode::CREATED, jar, axum::Json(account)))
}

/// Axum handler for `POST /api/auth/login`.
pub async fn login_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    jar: CookieJar,
    axum::Json(request): axum::Json<LoginRequest>,
) -> Result<(CookieJar, axum::Json<AccountView>), AppError> {
    let (account, token) = process_login(
        state.user_repo.as_ref(),
        state.session_repo.as_ref(),
        request,
        state.session_ttl,
        Utc::now(),
    )
    .await?;

    let jar = jar.add(session_cookie(token, state.session_ttl, state.cookie_secure));
    Ok((jar, axum::Json(account)))
}

/// Axum handler for `POST /api/auth/logout`. Succeeds even without a session.
pub async fn logout_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    jar: CookieJar,
) -> Result<(axum::http::StatusCode, CookieJar), AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.session_repo.delete(&hash_token(cookie.value())).await?;
    }

    Ok((axum::http::StatusCode::NO_CONTENT, jar.add(removal_cookie())))
}

/// Axum handler for `GET /api/auth/me`.
pub async fn me_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<axum::Json<AccountView>, AppError> {
    let stored = state
        .user_repo
        .find_by_id(&user.user_id)
        .await?
        .ok_or_else(|| AppError::Auth("Session user no longer exists".into()))?;
    Ok(axum::Json(AccountView::from(&stored)))
}

/// Axum handler for `PUT /api/users/me`.
pub async fn update_profile_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::Json(update): axum::Json<ProfileUpdate>,
) -> Result<axum::Json<AccountView>, AppError> {
    let account = process_update_profile(state.user_repo.as_ref(), &user, update).await?;
    Ok(axum::Json(account))
}

/// Axum handler for `GET /api/users/{username}`.
pub async fn get_profile_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    viewer: Option<CurrentUser>,
    axum::extract::Path(username): axum::extract::Path<String>,
) -> Result<axum::Json<ProfileView>, AppError> {
    let user = find_user(state.user_repo.as_ref(), &username).await?;
    let viewer_id = viewer.map(|CurrentUser(v)| v.user_id);
    Ok(axum::Json(ProfileView::new(&user, viewer_id.as_deref())))
}

/// Axum handler for `POST /api/users/{username}/follow`.
pub async fn follow_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::extract::Path(username): axum::extract::Path<String>,
) -> Result<axum::Json<FollowResponse>, AppError> {
    let response = process_follow(
        state.user_repo.as_ref(),
        state.notification_repo.as_ref(),
        &user,
        &username,
    )
    .await?;
    Ok(axum::Json(response))
}

/// Axum handler for `DELETE /api/users/{username}/follow`.
pub async fn unfollow_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::extract::Path(username): axum::extract::Path<String>,
) -> Result<axum::Json<FollowResponse>, AppError> {
    let response = process_unfollow(state.user_repo.as_ref(), &user, &username).await?;
    Ok(axum::Json(response))
}

/// Axum handler for `GET /api/users/{username}/followers`.
pub async fn followers_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    axum::extract::Path(username): axum::extract::Path<String>,
) -> Result<axum::Json<Vec<UserSummary>>, AppError> {
    Ok(axum::Json(
        process_followers(state.user_repo.as_ref(), &username).await?,
    ))
}

/// Axum handler for `GET /api/users/{username}/following`.
pub async fn following_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    axum::extract::Path(username): axum::extract::Path<String>,
) -> Result<axum::Json<Vec<UserSummary>>, AppError> {
    Ok(axum::Json(
        process_following(state.user_repo.as_ref(), &username).await?,
    ))
}
