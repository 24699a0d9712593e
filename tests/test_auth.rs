mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn register_logs_in_and_me_returns_account() {
    let env = common::TestEnv::start().await;
    let server = env.server();

    let id = env.register(&server, "alice").await;

    let me: serde_json::Value = server.get("/api/auth/me").await.json();
    assert_eq!(me["id"].as_str(), Some(id.as_str()));
    assert_eq!(me["username"].as_str(), Some("alice"));
    assert_eq!(me["email"].as_str(), Some("alice@example.com"));
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn me_without_session_is_unauthorized() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();

    let response = server.get("/api/auth/me").await;
    response.assert_status_unauthorized();

    let body: serde_json::Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn login_by_username_or_email() {
    let env = common::TestEnv::start().await;
    let registering = env.server();
    env.register(&registering, "bob").await;

    for login in ["bob", "BOB@example.com"] {
        let server = env.server();
        server
            .post("/api/auth/login")
            .json(&serde_json::json!({ "login": login, "password": "password123" }))
            .await
            .assert_status_ok();

        let me: serde_json::Value = server.get("/api/auth/me").await.json();
        assert_eq!(me["username"].as_str(), Some("bob"));
    }
}

#[tokio::test]
async fn login_invalid_credentials() {
    let env = common::TestEnv::start().await;
    env.register(&env.server(), "carol").await;

    let server = env.server_permissive();
    server
        .post("/api/auth/login")
        .json(&serde_json::json!({ "login": "carol", "password": "not-the-password" }))
        .await
        .assert_status_unauthorized();

    server
        .post("/api/auth/login")
        .json(&serde_json::json!({ "login": "nobody", "password": "password123" }))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn logout_ends_session() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();
    env.register(&server, "dave").await;

    server.get("/api/auth/me").await.assert_status_ok();

    server
        .post("/api/auth/logout")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server.get("/api/auth/me").await.assert_status_unauthorized();
}

#[tokio::test]
async fn register_validation_and_duplicates() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();

    let bad_cases = [
        serde_json::json!({ "email": "no-at-sign", "username": "erin", "password": "password123" }),
        serde_json::json!({ "email": "erin@example.com", "username": "er", "password": "password123" }),
        serde_json::json!({ "email": "erin@example.com", "username": "erin!", "password": "password123" }),
        serde_json::json!({ "email": "erin@example.com", "username": "erin", "password": "short" }),
    ];
    for body in bad_cases {
        server
            .post("/api/auth/register")
            .json(&body)
            .await
            .assert_status_bad_request();
    }

    env.register(&env.server(), "erin").await;

    server
        .post("/api/auth/register")
        .json(&serde_json::json!({
            "email": "other@example.com",
            "username": "Erin",
            "password": "password123"
        }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let profile: serde_json::Value = server.get("/api/users/ERIN").await.json();
    assert_eq!(profile["username"].as_str(), Some("erin"));
}

#[tokio::test]
async fn news_author_cannot_log_in() {
    let source = std::sync::Arc::new(common::StaticNewsSource { articles: vec![] });
    let env = common::TestEnv::start_with_news(Some(source)).await;
    let server = env.server_permissive();

    server
        .post("/api/auth/login")
        .json(&serde_json::json!({ "login": "newsbot", "password": "" }))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn profile_update_and_public_view() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();
    env.register(&server, "frank").await;

    server
        .put("/api/users/me")
        .json(&serde_json::json!({
            "display_name": "Frank F.",
            "bio": "Writes about compilers",
            "avatar_url": "https://img.example.com/frank.png"
        }))
        .await
        .assert_status_ok();

    server
        .put("/api/users/me")
        .json(&serde_json::json!({ "avatar_url": "ftp://example.com/a.png" }))
        .await
        .assert_status_bad_request();

    let anonymous = env.server();
    let profile: serde_json::Value = anonymous.get("/api/users/frank").await.json();
    assert_eq!(profile["display_name"].as_str(), Some("Frank F."));
    assert_eq!(profile["bio"].as_str(), Some("Writes about compilers"));
    assert_eq!(profile["follower_count"].as_u64(), Some(0));
    assert!(profile.get("email").is_none());
    assert!(profile.get("is_following").is_none());

    env.server_permissive()
        .get("/api/users/ghost")
        .await
        .assert_status_not_found();
}
