use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::middleware::SERVICE_TOKEN_HEADER;
use crate::error::AppError;

pub use crate::state::AppState;

/// Build the HTTP router with every API route.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health::health_handler))
        // Auth
        .route("/api/auth/register", post(api::users::register_handler))
        .route("/api/auth/login", post(api::users::login_handler))
        .route("/api/auth/logout", post(api::users::logout_handler))
        .route("/api/auth/me", get(api::users::me_handler))
        // Users and follows
        .route("/api/users/me", axum::routing::put(api::users::update_profile_handler))
        .route("/api/users/{username}", get(api::users::get_profile_handler))
        .route(
            "/api/users/{username}/follow",
            post(api::users::follow_handler).delete(api::users::unfollow_handler),
        )
        .route(
            "/api/users/{username}/followers",
            get(api::users::followers_handler),
        )
        .route(
            "/api/users/{username}/following",
            get(api::users::following_handler),
        )
        // Posts
        .route(
            "/api/posts",
            get(api::posts::list_posts_handler).post(api::posts::create_post_handler),
        )
        .route("/api/posts/feed", get(api::posts::feed_handler))
        .route(
            "/api/posts/{id}",
            get(api::posts::get_post_handler)
                .put(api::posts::update_post_handler)
                .delete(api::posts::delete_post_handler),
        )
        .route(
            "/api/posts/{id}/comments",
            post(api::comments::add_comment_handler),
        )
        .route(
            "/api/posts/{id}/comments/{comment_id}",
            delete(api::comments::delete_comment_handler),
        )
        .route(
            "/api/posts/{id}/reactions",
            post(api::reactions::react_handler),
        )
        .route("/api/posts/{id}/repost", post(api::reactions::repost_handler))
        // Notifications
        .route(
            "/api/notifications",
            get(api::notifications::list_notifications_handler),
        )
        .route(
            "/api/notifications/unread-count",
            get(api::notifications::unread_count_handler),
        )
        .route(
            "/api/notifications/read-all",
            post(api::notifications::mark_all_read_handler),
        )
        .route(
            "/api/notifications/{id}/read",
            post(api::notifications::mark_read_handler),
        )
        .route(
            "/api/notifications/{id}",
            delete(api::notifications::delete_notification_handler),
        )
        // News
        .route("/api/news/import", post(api::news::import_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for a single browser origin. Credentials are allowed so the session
/// cookie is sent.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, AppError> {
    let origin = HeaderValue::from_str(origin)
        .map_err(|e| AppError::BadRequest(format!("Invalid CORS origin '{origin}': {e}")))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(SERVICE_TOKEN_HEADER)]))
}
