//! Company-scoped HTTP tests: branches, users, payroll and the activity trail

use super::{build_test_router, TestAppState, TestRequest};
use axum::http::StatusCode;
use payroll_core::context::Context;
use payroll_core::domain::{PayrollConfig, Role, StringUuid, UserInfo};
use payroll_core::repository::{AccessRepository, PayrollConfigRepository};
use payroll_core::tenancy::COMPANY_HEADER;
use serde_json::json;

struct Company {
    state: TestAppState,
    id: StringUuid,
    admin: UserInfo,
    admin_token: String,
}

async fn company_with_admin() -> Company {
    let state = TestAppState::new();
    let id = StringUuid::new_v4();
    let admin = state.add_user("ada", "password-1", Role::Admin).await;
    state.grant(&admin, id, Role::Admin).await;
    let admin_token = state.access_token(&admin);
    Company {
        state,
        id,
        admin,
        admin_token,
    }
}

#[tokio::test]
async fn test_admin_creates_branch_and_activity_is_recorded() {
    let company = company_with_admin().await;
    let app = build_test_router(company.state.clone());

    let response = TestRequest::post("/api/v1/branches", &json!({ "name": "  Makati  " }))
        .bearer(&company.admin_token)
        .header(COMPANY_HEADER, company.id.to_string())
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json()["data"]["name"], "Makati");
    assert_eq!(response.json()["data"]["company_id"], company.id.to_string());
    assert_eq!(company.state.backend.operations(), vec!["begin", "commit"]);

    company.state.settle().await;
    assert_eq!(company.state.activity_repo.actions().await, vec!["create"]);

    let listed = TestRequest::get("/api/v1/activity-logs")
        .bearer(&company.admin_token)
        .header(COMPANY_HEADER, company.id.to_string())
        .send(&app)
        .await;
    assert_eq!(listed.status, StatusCode::OK);
    let logs = listed.json()["data"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["entity_name"], "branch");
    assert_eq!(logs[0]["user_id"], company.admin.id.to_string());
}

#[tokio::test]
async fn test_member_cannot_create_branch() {
    let company = company_with_admin().await;
    let hr = company.state.add_user("hana", "password-1", Role::Hr).await;
    company.state.grant(&hr, company.id, Role::Hr).await;
    let token = company.state.access_token(&hr);
    let app = build_test_router(company.state.clone());

    let response = TestRequest::post("/api/v1/branches", &json!({ "name": "Cebu" }))
        .bearer(&token)
        .header(COMPANY_HEADER, company.id.to_string())
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(company.state.backend.operations().is_empty());
}

#[tokio::test]
async fn test_member_cannot_read_activity() {
    let company = company_with_admin().await;
    let hr = company.state.add_user("hana", "password-1", Role::Hr).await;
    company.state.grant(&hr, company.id, Role::Hr).await;
    let token = company.state.access_token(&hr);
    let app = build_test_router(company.state);

    let response = TestRequest::get("/api/v1/activity-logs")
        .bearer(&token)
        .header(COMPANY_HEADER, company.id.to_string())
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_assign_branch_access() {
    let company = company_with_admin().await;
    let app = build_test_router(company.state.clone());

    let created = TestRequest::post("/api/v1/branches", &json!({ "name": "Davao" }))
        .bearer(&company.admin_token)
        .header(COMPANY_HEADER, company.id.to_string())
        .send(&app)
        .await;
    let branch_id = created.json()["data"]["id"].as_str().unwrap().to_string();
    let path = format!("/api/v1/branches/{}/access", branch_id);

    let outsider = company.state.add_user("otto", "password-1", Role::Hr).await;
    let rejected = TestRequest::post(&path, &json!({ "user_id": outsider.id }))
        .bearer(&company.admin_token)
        .header(COMPANY_HEADER, company.id.to_string())
        .send(&app)
        .await;
    assert_eq!(rejected.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(rejected.json()["type"], "unprocessable");

    company.state.grant(&outsider, company.id, Role::Hr).await;
    let assigned = TestRequest::post(&path, &json!({ "user_id": outsider.id }))
        .bearer(&company.admin_token)
        .header(COMPANY_HEADER, company.id.to_string())
        .send(&app)
        .await;
    assert_eq!(assigned.status, StatusCode::CREATED);
    assert_eq!(assigned.json()["data"]["assigned"], true);

    let again = TestRequest::post(&path, &json!({ "user_id": outsider.id }))
        .bearer(&company.admin_token)
        .header(COMPANY_HEADER, company.id.to_string())
        .send(&app)
        .await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.json()["data"]["assigned"], false);

    let access = company
        .state
        .access_repo
        .find_branch_access(
            &Context::background(),
            outsider.id,
            branch_id.parse().unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(access.map(|a| a.company_id), Some(company.id));
}

#[tokio::test]
async fn test_assign_access_to_foreign_branch_is_not_found() {
    let company = company_with_admin().await;
    let foreign_branch = StringUuid::new_v4();
    company
        .state
        .access_repo
        .add_branch(foreign_branch, StringUuid::new_v4())
        .await;
    let app = build_test_router(company.state.clone());

    let response = TestRequest::post(
        &format!("/api/v1/branches/{}/access", foreign_branch),
        &json!({ "user_id": company.admin.id }),
    )
    .bearer(&company.admin_token)
    .header(COMPANY_HEADER, company.id.to_string())
    .send(&app)
    .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_creates_user_in_company() {
    let company = company_with_admin().await;
    let app = build_test_router(company.state.clone());

    let response = TestRequest::post(
        "/api/v1/users",
        &json!({ "username": "tim", "password": "password-1", "role": "timekeeper" }),
    )
    .bearer(&company.admin_token)
    .header(COMPANY_HEADER, company.id.to_string())
    .send(&app)
    .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let user_id: StringUuid = response.json()["data"]["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let grant = company
        .state
        .access_repo
        .find_company_role(&Context::background(), user_id, company.id)
        .await
        .unwrap();
    assert_eq!(grant.map(|g| g.role), Some(Role::Timekeeper));

    let duplicate = TestRequest::post(
        "/api/v1/users",
        &json!({ "username": "tim", "password": "password-1", "role": "hr" }),
    )
    .bearer(&company.admin_token)
    .header(COMPANY_HEADER, company.id.to_string())
    .send(&app)
    .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(
        company.state.backend.operations(),
        vec!["begin", "commit", "begin", "rollback"]
    );
}

#[tokio::test]
async fn test_superadmin_role_cannot_be_created() {
    let company = company_with_admin().await;
    let app = build_test_router(company.state);

    let response = TestRequest::post(
        "/api/v1/users",
        &json!({ "username": "eve", "password": "password-1", "role": "superadmin" }),
    )
    .bearer(&company.admin_token)
    .header(COMPANY_HEADER, company.id.to_string())
    .send(&app)
    .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_current_cycle_without_config_is_not_applicable() {
    let company = company_with_admin().await;
    let app = build_test_router(company.state);

    let response = TestRequest::get("/api/v1/payroll/current-cycle")
        .bearer(&company.admin_token)
        .header(COMPANY_HEADER, company.id.to_string())
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json()["type"], "not_applicable");

    let config = TestRequest::get("/api/v1/payroll/config")
        .bearer(&company.admin_token)
        .header(COMPANY_HEADER, company.id.to_string())
        .send(&app)
        .await;
    assert_eq!(config.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_current_cycle_with_config() {
    let company = company_with_admin().await;
    company
        .state
        .payroll_repo
        .create(&Context::background(), &PayrollConfig::with_defaults(company.id))
        .await
        .unwrap();
    let app = build_test_router(company.state);

    let response = TestRequest::get("/api/v1/payroll/current-cycle")
        .bearer(&company.admin_token)
        .header(COMPANY_HEADER, company.id.to_string())
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["data"]["company_id"], company.id.to_string());
    assert!(response.json()["data"]["pay_date"].is_string());
}
