//! Tenant resolution HTTP tests
//!
//! `X-Company-ID` / `X-Branch-ID` handling in front of protected endpoints.

use super::{build_test_router, TestAppState, TestRequest};
use axum::http::StatusCode;
use payroll_core::domain::{Role, StringUuid};
use payroll_core::tenancy::{BRANCH_HEADER, COMPANY_HEADER};

#[tokio::test]
async fn test_company_without_grant_is_forbidden() {
    let state = TestAppState::new();
    let hr = state.add_user("hana", "password-1", Role::Hr).await;
    let token = state.access_token(&hr);
    let app = build_test_router(state);

    let response = TestRequest::get("/api/v1/branches")
        .bearer(&token)
        .header(COMPANY_HEADER, StringUuid::new_v4().to_string())
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json()["type"], "forbidden");
    assert_eq!(response.json()["detail"], "no access to company");
    assert_eq!(response.json()["instance"], "/api/v1/branches");
}

#[tokio::test]
async fn test_malformed_company_header_is_bad_request() {
    let state = TestAppState::new();
    let hr = state.add_user("hana", "password-1", Role::Hr).await;
    let token = state.access_token(&hr);
    let app = build_test_router(state);

    let response = TestRequest::get("/api/v1/branches")
        .bearer(&token)
        .header(COMPANY_HEADER, "not-a-uuid")
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_branch_without_company_is_bad_request() {
    let state = TestAppState::new();
    let hr = state.add_user("hana", "password-1", Role::Hr).await;
    let token = state.access_token(&hr);
    let app = build_test_router(state);

    let response = TestRequest::get("/api/v1/branches")
        .bearer(&token)
        .header(BRANCH_HEADER, StringUuid::new_v4().to_string())
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tenant_scoped_endpoint_without_headers() {
    let state = TestAppState::new();
    let hr = state.add_user("hana", "password-1", Role::Hr).await;
    let token = state.access_token(&hr);
    let app = build_test_router(state);

    let response = TestRequest::get("/api/v1/branches")
        .bearer(&token)
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["detail"], "missing tenant context");
}

#[tokio::test]
async fn test_granted_member_sees_company_branches() {
    let state = TestAppState::new();
    let company_id = StringUuid::new_v4();
    let hr = state.add_user("hana", "password-1", Role::Hr).await;
    state.grant(&hr, company_id, Role::Hr).await;
    let token = state.access_token(&hr);
    let app = build_test_router(state);

    let response = TestRequest::get("/api/v1/branches")
        .bearer(&token)
        .header(COMPANY_HEADER, company_id.to_string())
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["data"], serde_json::json!([]));
}

#[tokio::test]
async fn test_branch_hint_requires_assignment() {
    let state = TestAppState::new();
    let company_id = StringUuid::new_v4();
    let branch_id = StringUuid::new_v4();
    state.access_repo.add_branch(branch_id, company_id).await;

    let hr = state.add_user("hana", "password-1", Role::Hr).await;
    state.grant(&hr, company_id, Role::Hr).await;
    let token = state.access_token(&hr);
    let app = build_test_router(state);

    let response = TestRequest::get("/api/v1/branches")
        .bearer(&token)
        .header(COMPANY_HEADER, company_id.to_string())
        .header(BRANCH_HEADER, branch_id.to_string())
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json()["detail"], "no access to branch");
}

#[tokio::test]
async fn test_superadmin_needs_no_grant_but_branch_must_match() {
    let state = TestAppState::new();
    let company_id = StringUuid::new_v4();
    let foreign_branch = StringUuid::new_v4();
    state
        .access_repo
        .add_branch(foreign_branch, StringUuid::new_v4())
        .await;

    let root = state.add_user("root", "password-1", Role::Superadmin).await;
    let token = state.access_token(&root);
    let app = build_test_router(state);

    let scoped = TestRequest::get("/api/v1/branches")
        .bearer(&token)
        .header(COMPANY_HEADER, company_id.to_string())
        .send(&app)
        .await;
    assert_eq!(scoped.status, StatusCode::OK);

    let mismatched = TestRequest::get("/api/v1/branches")
        .bearer(&token)
        .header(COMPANY_HEADER, company_id.to_string())
        .header(BRANCH_HEADER, foreign_branch.to_string())
        .send(&app)
        .await;
    assert_eq!(mismatched.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_auth_checked_before_tenant_headers() {
    let app = build_test_router(TestAppState::new());

    let response = TestRequest::get("/api/v1/branches")
        .header(COMPANY_HEADER, "not-a-uuid")
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
