//! Auth API HTTP handler tests
//!
//! Login, refresh rotation, logout and the principal endpoints.

use super::{build_test_router, cookie_value, TestAppState, TestRequest};
use axum::http::StatusCode;
use payroll_core::domain::{LoginStatus, Role, StringUuid};
use serde_json::json;

async fn login(app: &axum::Router, username: &str, password: &str) -> super::TestResponse {
    TestRequest::post(
        "/api/v1/auth/login",
        &json!({ "username": username, "password": password }),
    )
    .header("x-forwarded-for", "203.0.113.5, 10.0.0.1")
    .header("user-agent", "payroll-tests/1.0")
    .send(app)
    .await
}

async fn logout(app: &axum::Router, refresh_token: &str) -> super::TestResponse {
    TestRequest::post_empty("/api/v1/auth/logout")
        .header("cookie", format!("refresh_token={}", refresh_token))
        .send(app)
        .await
}

#[tokio::test]
async fn test_login_success_sets_cookie_and_returns_pair() {
    let state = TestAppState::new();
    let alice = state.add_user("alice", "correct-horse", Role::Hr).await;
    let app = build_test_router(state.clone());

    let response = login(&app, "alice", "correct-horse").await;

    assert_eq!(response.status, StatusCode::OK);
    let data = &response.json()["data"];
    assert_eq!(data["user"]["username"], "alice");
    assert_eq!(data["user"]["role"], "hr");
    assert_eq!(data["token_type"], "Bearer");
    assert!(data["expires_in"].as_i64().unwrap() > 0);

    let cookie = response.set_cookie().expect("refresh cookie");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/api/v1/auth"));
    assert!(cookie.contains("SameSite=Strict"));
    assert_eq!(
        cookie_value(&cookie, "refresh_token").as_deref(),
        data["refresh_token"].as_str()
    );

    let entries = state.access_log_repo.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, LoginStatus::Success);
    assert_eq!(entries[0].user_id, Some(alice.id));
    assert_eq!(entries[0].ip.as_deref(), Some("203.0.113.5"));
    assert_eq!(entries[0].user_agent.as_deref(), Some("payroll-tests/1.0"));
}

#[tokio::test]
async fn test_login_wrong_password_is_generic_401() {
    let state = TestAppState::new();
    state.add_user("alice", "correct-horse", Role::Hr).await;
    let app = build_test_router(state.clone());

    let wrong_password = login(&app, "alice", "battery-staple").await;
    let unknown_user = login(&app, "mallory", "battery-staple").await;

    for response in [&wrong_password, &unknown_user] {
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.json()["type"], "unauthorized");
        assert_eq!(response.json()["instance"], "/api/v1/auth/login");
        assert!(response.set_cookie().is_none());
    }
    // Same message whether or not the username exists
    assert_eq!(
        wrong_password.json()["detail"],
        unknown_user.json()["detail"]
    );

    let entries = state.access_log_repo.entries().await;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.status == LoginStatus::Failed));
}

#[tokio::test]
async fn test_login_malformed_body_is_normalized() {
    let app = build_test_router(TestAppState::new());

    let response = TestRequest::post("/api/v1/auth/login", &json!({ "username": 42 }))
        .send(&app)
        .await;

    assert!(response.status.is_client_error());
    assert_eq!(response.json()["type"], "bad_request");
    assert_eq!(response.json()["detail"], "Invalid request body");
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_reuse() {
    let state = TestAppState::new();
    state.add_user("alice", "correct-horse", Role::Hr).await;
    let app = build_test_router(state);

    let first = login(&app, "alice", "correct-horse").await;
    let old_refresh = first.json()["data"]["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    let rotated = TestRequest::post("/api/v1/auth/refresh", &json!({ "refresh_token": old_refresh }))
        .send(&app)
        .await;
    assert_eq!(rotated.status, StatusCode::OK);
    let new_refresh = rotated.json()["data"]["refresh_token"].as_str().unwrap();
    assert_ne!(new_refresh, old_refresh);
    assert!(rotated.set_cookie().unwrap().contains(new_refresh));

    let replay = TestRequest::post("/api/v1/auth/refresh", &json!({ "refresh_token": old_refresh }))
        .send(&app)
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_records_through_login_rotation_and_logout() {
    let state = TestAppState::new();
    let alice = state.add_user("alice", "correct-horse", Role::Admin).await;
    let app = build_test_router(state.clone());

    let first = login(&app, "alice", "correct-horse").await;
    let old_refresh = first.json()["data"]["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();
    let issued = state.refresh_record(&old_refresh).await.expect("digest persisted");
    assert_eq!(issued.user_id, alice.id);
    assert!(issued.revoked_at.is_none());
    // Only the digest is stored, never the token itself
    assert_ne!(issued.token_hash, old_refresh);

    let rotated = TestRequest::post("/api/v1/auth/refresh", &json!({ "refresh_token": old_refresh }))
        .send(&app)
        .await;
    assert_eq!(rotated.status, StatusCode::OK);
    let new_refresh = rotated.json()["data"]["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(state.refresh_record(&old_refresh).await.unwrap().revoked_at.is_some());
    let replacement = state.refresh_record(&new_refresh).await.expect("new digest persisted");
    assert!(replacement.revoked_at.is_none());
    assert_eq!(state.refresh_repo.len().await, 2);

    let logout = TestRequest::post_empty("/api/v1/auth/logout")
        .header("cookie", format!("refresh_token={}", new_refresh))
        .send(&app)
        .await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);
    assert!(state.refresh_record(&new_refresh).await.unwrap().revoked_at.is_some());

    let replay = TestRequest::post("/api/v1/auth/refresh", &json!({ "refresh_token": new_refresh }))
        .send(&app)
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_second_logout_keeps_first_revocation_time() {
    let state = TestAppState::new();
    state.add_user("alice", "correct-horse", Role::Hr).await;
    let app = build_test_router(state.clone());

    let first = login(&app, "alice", "correct-horse").await;
    let refresh = first.json()["data"]["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    assert_eq!(logout(&app, &refresh).await.status, StatusCode::NO_CONTENT);
    let revoked_at = state.refresh_record(&refresh).await.unwrap().revoked_at;
    assert!(revoked_at.is_some());

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert_eq!(logout(&app, &refresh).await.status, StatusCode::NO_CONTENT);
    assert_eq!(state.refresh_record(&refresh).await.unwrap().revoked_at, revoked_at);
}

#[tokio::test]
async fn test_refresh_from_cookie() {
    let state = TestAppState::new();
    state.add_user("alice", "correct-horse", Role::Hr).await;
    let app = build_test_router(state.clone());

    let first = login(&app, "alice", "correct-horse").await;
    let token = cookie_value(&first.set_cookie().unwrap(), "refresh_token").unwrap();

    let response = TestRequest::post_empty("/api/v1/auth/refresh")
        .header("cookie", format!("refresh_token={}", token))
        .send(&app)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(state.backend.operations(), vec!["begin", "commit"]);
}

#[tokio::test]
async fn test_refresh_without_token_is_401() {
    let app = build_test_router(TestAppState::new());

    let response = TestRequest::post_empty("/api/v1/auth/refresh").send(&app).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_access_token_rejected_as_refresh() {
    let state = TestAppState::new();
    state.add_user("alice", "correct-horse", Role::Hr).await;
    let app = build_test_router(state);

    let first = login(&app, "alice", "correct-horse").await;
    let access = first.json()["data"]["access_token"].as_str().unwrap();

    let response = TestRequest::post("/api/v1/auth/refresh", &json!({ "refresh_token": access }))
        .send(&app)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_refresh_and_clears_cookie() {
    let state = TestAppState::new();
    state.add_user("alice", "correct-horse", Role::Hr).await;
    let app = build_test_router(state);

    let first = login(&app, "alice", "correct-horse").await;
    let refresh = first.json()["data"]["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    let logout = TestRequest::post_empty("/api/v1/auth/logout")
        .header("cookie", format!("refresh_token={}", refresh))
        .send(&app)
        .await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);
    let cleared = logout.set_cookie().expect("removal cookie");
    assert!(cleared.starts_with("refresh_token="));
    assert!(cleared.contains("Max-Age=0"));

    let after = TestRequest::post("/api/v1/auth/refresh", &json!({ "refresh_token": refresh }))
        .send(&app)
        .await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_token_still_succeeds() {
    let app = build_test_router(TestAppState::new());

    let response = TestRequest::post_empty("/api/v1/auth/logout").send(&app).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_me_requires_bearer() {
    let app = build_test_router(TestAppState::new());

    let response = TestRequest::get("/api/v1/auth/me").send(&app).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["instance"], "/api/v1/auth/me");

    let garbage = TestRequest::get("/api/v1/auth/me")
        .bearer("not-a-jwt")
        .send(&app)
        .await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_principal() {
    let state = TestAppState::new();
    let alice = state.add_user("alice", "correct-horse", Role::Timekeeper).await;
    let token = state.access_token(&alice);
    let app = build_test_router(state);

    let response = TestRequest::get("/api/v1/auth/me")
        .bearer(&token)
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["data"]["id"], alice.id.to_string());
    assert_eq!(response.json()["data"]["role"], "timekeeper");
}

#[tokio::test]
async fn test_me_for_missing_principal_is_404() {
    let state = TestAppState::new();
    let ghost = payroll_core::domain::UserInfo {
        id: StringUuid::new_v4(),
        username: "ghost".to_string(),
        role: Role::Hr,
    };
    let token = state.access_token(&ghost);
    let app = build_test_router(state);

    let response = TestRequest::get("/api/v1/auth/me")
        .bearer(&token)
        .send(&app)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_change_password_then_login_with_new_one() {
    let state = TestAppState::new();
    let alice = state.add_user("alice", "correct-horse", Role::Hr).await;
    let token = state.access_token(&alice);
    let app = build_test_router(state);

    let wrong = TestRequest::post(
        "/api/v1/auth/change-password",
        &json!({ "current_password": "nope", "new_password": "new-password-1" }),
    )
    .bearer(&token)
    .send(&app)
    .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);

    let changed = TestRequest::post(
        "/api/v1/auth/change-password",
        &json!({ "current_password": "correct-horse", "new_password": "new-password-1" }),
    )
    .bearer(&token)
    .send(&app)
    .await;
    assert_eq!(changed.status, StatusCode::OK);

    assert_eq!(
        login(&app, "alice", "correct-horse").await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(&app, "alice", "new-password-1").await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_change_password_validates_length() {
    let state = TestAppState::new();
    let alice = state.add_user("alice", "correct-horse", Role::Hr).await;
    let token = state.access_token(&alice);
    let app = build_test_router(state);

    let response = TestRequest::post(
        "/api/v1/auth/change-password",
        &json!({ "current_password": "correct-horse", "new_password": "short" }),
    )
    .bearer(&token)
    .send(&app)
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json()["extra"].is_object());
}

#[tokio::test]
async fn test_change_password_to_same_value_is_unprocessable() {
    let state = TestAppState::new();
    let alice = state.add_user("alice", "correct-horse", Role::Hr).await;
    let token = state.access_token(&alice);
    let app = build_test_router(state);

    let response = TestRequest::post(
        "/api/v1/auth/change-password",
        &json!({ "current_password": "correct-horse", "new_password": "correct-horse" }),
    )
    .bearer(&token)
    .send(&app)
    .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json()["type"], "unprocessable");

    // The stored password is untouched
    assert_eq!(
        login(&app, "alice", "correct-horse").await.status,
        StatusCode::OK
    );
}
