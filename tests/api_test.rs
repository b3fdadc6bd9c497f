//! API integration tests
//!
//! Teams, memberships, invitations, staff endpoints and the schema routes.

mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{create_user, setup_test_app, subscribe_team, with_token};

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let app = setup_test_app().await?;

    let response = app.server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["service"], "vulmatch-web");
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());

    Ok(())
}

#[tokio::test]
async fn test_token_authentication() -> Result<()> {
    let app = setup_test_app().await?;

    let response = app.server.get("/teams/api/teams").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["detail"], "Authentication credentials were not provided.");

    let response = app
        .server
        .get("/teams/api/teams")
        .add_header(
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderValue::from_static("Bearer abc"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["detail"], "Invalid token header.");

    let response = with_token(app.server.get("/teams/api/teams"), "unknown").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let (user, token) = create_user(&app, "jane@example.com", false).await?;
    let response = with_token(app.server.get("/rest-auth/user"), &token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["id"], user.id.to_string());
    assert_eq!(body["email"], "jane@example.com");

    Ok(())
}

#[tokio::test]
async fn test_team_crud_api() -> Result<()> {
    let app = setup_test_app().await?;
    let (owner, token) = create_user(&app, "owner@example.com", false).await?;

    let response = with_token(app.server.post("/teams/api/teams"), &token)
        .json(&json!({"name": "Red Team", "description": "Offensive research"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let team: Value = response.json();
    let team_id = team["id"].as_str().unwrap().to_string();
    assert_eq!(team["name"], "Red Team");
    assert_eq!(team["is_owner"], true);
    assert_eq!(team["is_admin"], true);
    assert_eq!(team["owner_id"], owner.id.to_string());
    assert_eq!(team["allowed_api_access"], false);

    let response = with_token(app.server.get("/teams/api/teams"), &token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let teams: Vec<Value> = response.json();
    assert_eq!(teams.len(), 1);

    let response = with_token(app.server.get("/teams/api/teams"), &token)
        .add_query_param("search", "offensive")
        .await;
    let teams: Vec<Value> = response.json();
    assert_eq!(teams.len(), 1);
    let response = with_token(app.server.get("/teams/api/teams"), &token)
        .add_query_param("search", "blue")
        .await;
    let teams: Vec<Value> = response.json();
    assert!(teams.is_empty());

    let response = with_token(app.server.patch(&format!("/teams/api/teams/{}", team_id)), &token)
        .json(&json!({"name": "Purple Team"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let team: Value = response.json();
    assert_eq!(team["name"], "Purple Team");

    let response =
        with_token(app.server.get(&format!("/teams/api/teams/{}/members", team_id)), &token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let members: Vec<Value> = response.json();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["role"], "owner");
    assert_eq!(members[0]["email"], "owner@example.com");

    let response =
        with_token(app.server.get(&format!("/teams/api/teams/{}/limits", team_id)), &token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let limits: Value = response.json();
    assert_eq!(limits["members_count"], 1);
    assert_eq!(limits["user_limit"], 1);
    assert_eq!(limits["limits_exceeded"], false);

    let response = with_token(app.server.get("/teams/api/teams/membership"), &token).await;
    let memberships: Vec<Value> = response.json();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0]["team"]["name"], "Purple Team");

    let response =
        with_token(app.server.delete(&format!("/teams/api/teams/{}", team_id)), &token).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response =
        with_token(app.server.get(&format!("/teams/api/teams/{}", team_id)), &token).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_team_list_ordering() -> Result<()> {
    let app = setup_test_app().await?;
    let (_, token) = create_user(&app, "owner@example.com", false).await?;

    for name in ["Bravo", "Alpha", "Charlie"] {
        with_token(app.server.post("/teams/api/teams"), &token)
            .json(&json!({"name": name}))
            .await;
    }

    let names = |teams: Vec<Value>| -> Vec<String> {
        teams
            .iter()
            .map(|team| team["name"].as_str().unwrap().to_string())
            .collect()
    };

    let response = with_token(app.server.get("/teams/api/teams"), &token).await;
    assert_eq!(names(response.json()), vec!["Alpha", "Bravo", "Charlie"]);

    let response = with_token(app.server.get("/teams/api/teams"), &token)
        .add_query_param("ordering", "-name")
        .await;
    assert_eq!(names(response.json()), vec!["Charlie", "Bravo", "Alpha"]);

    Ok(())
}

#[tokio::test]
async fn test_team_name_is_required() -> Result<()> {
    let app = setup_test_app().await?;
    let (_, token) = create_user(&app, "owner@example.com", false).await?;

    let response = with_token(app.server.post("/teams/api/teams"), &token)
        .json(&json!({"name": "  "}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["name"], json!(["This field may not be blank."]));

    Ok(())
}

#[tokio::test]
async fn test_outsiders_cannot_see_team() -> Result<()> {
    let app = setup_test_app().await?;
    let (_, owner_token) = create_user(&app, "owner@example.com", false).await?;
    let (_, outsider_token) = create_user(&app, "outsider@example.com", false).await?;

    let response = with_token(app.server.post("/teams/api/teams"), &owner_token)
        .json(&json!({"name": "Private"}))
        .await;
    let team: Value = response.json();
    let team_id = team["id"].as_str().unwrap().to_string();

    let response =
        with_token(app.server.get(&format!("/teams/api/teams/{}", team_id)), &outsider_token).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = with_token(
        app.server.get(&format!("/teams/api/teams/{}/invitations", team_id)),
        &outsider_token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn test_invitation_accept_flow() -> Result<()> {
    let app = setup_test_app().await?;
    let (_, owner_token) = create_user(&app, "owner@example.com", false).await?;
    let (bob, bob_token) = create_user(&app, "bob@example.com", false).await?;

    let response = with_token(app.server.post("/teams/api/teams"), &owner_token)
        .json(&json!({"name": "Red Team"}))
        .await;
    let team: Value = response.json();
    let team_id = team["id"].as_str().unwrap().to_string();

    let response = with_token(
        app.server.post(&format!("/teams/api/teams/{}/invitations", team_id)),
        &owner_token,
    )
    .json(&json!({"email": " bob@example.com ", "role": "member"}))
    .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let invitation: Value = response.json();
    assert_eq!(invitation["email"], "bob@example.com");
    assert_eq!(invitation["is_accepted"], false);
    let invitation_id = invitation["id"].as_str().unwrap().to_string();

    let response = with_token(
        app.server.post(&format!("/teams/api/teams/{}/invitations", team_id)),
        &owner_token,
    )
    .json(&json!({"email": "bob@example.com"}))
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(
        body,
        json!({"email": ["There is already a pending invitation for bob@example.com."]})
    );

    let response = with_token(app.server.get("/teams/api/user/invitations"), &bob_token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let invitations: Vec<Value> = response.json();
    assert_eq!(invitations.len(), 1);
    assert_eq!(invitations[0]["team"]["name"], "Red Team");

    let response = with_token(
        app.server.post(&format!(
            "/teams/api/user/invitations/{}/accept-invitation",
            invitation_id
        )),
        &bob_token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response =
        with_token(app.server.get(&format!("/teams/api/teams/{}/members", team_id)), &bob_token)
            .await;
    let members: Vec<Value> = response.json();
    assert_eq!(members.len(), 2);
    assert!(members
        .iter()
        .any(|member| member["user_id"] == bob.id.to_string() && member["role"] == "member"));

    let response = with_token(
        app.server.get(&format!("/teams/api/teams/{}/invitations", team_id)),
        &owner_token,
    )
    .add_query_param("is_accepted", "true")
    .await;
    let accepted: Vec<Value> = response.json();
    assert_eq!(accepted.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_invitation_user_limit() -> Result<()> {
    let app = setup_test_app().await?;
    let (_, token) = create_user(&app, "owner@example.com", false).await?;

    let response = with_token(app.server.post("/teams/api/teams"), &token)
        .json(&json!({"name": "Red Team"}))
        .await;
    let team: Value = response.json();
    let team_id = uuid::Uuid::parse_str(team["id"].as_str().unwrap())?;
    let invitations_url = format!("/teams/api/teams/{}/invitations", team_id);
    let bulk_url = format!("/teams/api/teams/{}/invitations/bulk-create", team_id);
    let limit_error = json!({"code": "E01", "message": "Team subscription user count exceeded"});

    // Without a subscription the limit is a single user.
    let response = with_token(app.server.post(&invitations_url), &token)
        .json(&json!({"email": "a@example.com"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let response = with_token(app.server.post(&invitations_url), &token)
        .json(&json!({"email": "b@example.com"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body, limit_error);

    let response = with_token(app.server.post(&bulk_url), &token)
        .json(&json!([{"email": "b@example.com"}]))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body, limit_error);

    // One member and one pending invitation leave a single seat out of three.
    subscribe_team(&app.db, team_id, "false", "3").await?;
    let response = with_token(app.server.post(&bulk_url), &token)
        .json(&json!([{"email": "b@example.com"}, {"email": "c@example.com"}]))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body, limit_error);

    let response = with_token(app.server.post(&bulk_url), &token)
        .json(&json!([{"email": "b@example.com"}]))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = with_token(app.server.get(&invitations_url), &token).await;
    let invitations: Vec<Value> = response.json();
    assert_eq!(invitations.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_owner_rules() -> Result<()> {
    let app = setup_test_app().await?;
    let (owner, owner_token) = create_user(&app, "owner@example.com", false).await?;
    let (bob, bob_token) = create_user(&app, "bob@example.com", false).await?;

    let response = with_token(app.server.post("/teams/api/teams"), &owner_token)
        .json(&json!({"name": "Red Team"}))
        .await;
    let team: Value = response.json();
    let team_id = uuid::Uuid::parse_str(team["id"].as_str().unwrap())?;
    subscribe_team(&app.db, team_id, "false", "5").await?;
    let invitations_url = format!("/teams/api/teams/{}/invitations", team_id);

    let response = with_token(app.server.post(&invitations_url), &owner_token)
        .json(&json!({"email": "bob@example.com", "role": "admin"}))
        .await;
    let invitation: Value = response.json();
    with_token(
        app.server.post(&format!(
            "/teams/api/user/invitations/{}/accept-invitation",
            invitation["id"].as_str().unwrap()
        )),
        &bob_token,
    )
    .await;

    // The only owner can be neither demoted nor removed.
    let response = with_token(
        app.server.post(&format!("/teams/api/teams/{}/change-role", team_id)),
        &owner_token,
    )
    .json(&json!({"user_id": owner.id, "role": "member"}))
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["detail"], "Team must have at least one owner");

    let response = with_token(
        app.server.post(&format!("/teams/api/teams/{}/remove-member", team_id)),
        &bob_token,
    )
    .json(&json!({"user_id": owner.id}))
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(
        body["detail"],
        "User is the only owner for this team, and can't be removed"
    );

    // Admins may invite, but only owners may invite owners.
    let response = with_token(app.server.post(&invitations_url), &bob_token)
        .json(&json!({"email": "carol@example.com", "role": "owner"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(
        body,
        json!({"role": ["Only a owner can invite another user as a owner"]})
    );

    let response = with_token(app.server.post(&invitations_url), &bob_token)
        .json(&json!({"email": "carol@example.com", "role": "member"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let response = with_token(app.server.post(&invitations_url), &owner_token)
        .json(&json!({"email": "dave@example.com", "role": "owner"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    // With a second owner the first one may step down.
    let response = with_token(
        app.server.post(&format!("/teams/api/teams/{}/change-role", team_id)),
        &owner_token,
    )
    .json(&json!({"user_id": bob.id, "role": "owner"}))
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = with_token(
        app.server.post(&format!("/teams/api/teams/{}/change-role", team_id)),
        &owner_token,
    )
    .json(&json!({"user_id": owner.id, "role": "member"}))
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response =
        with_token(app.server.get(&format!("/teams/api/teams/{}/members", team_id)), &bob_token)
            .await;
    let members: Vec<Value> = response.json();
    let role_of = |email: &str| {
        members
            .iter()
            .find(|member| member["email"] == email)
            .map(|member| member["role"].clone())
    };
    assert_eq!(role_of("owner@example.com"), Some(json!("member")));
    assert_eq!(role_of("bob@example.com"), Some(json!("owner")));

    Ok(())
}

#[tokio::test]
async fn test_member_cannot_invite_or_manage_roles() -> Result<()> {
    let app = setup_test_app().await?;
    let (owner, owner_token) = create_user(&app, "owner@example.com", false).await?;
    let (_, bob_token) = create_user(&app, "bob@example.com", false).await?;

    let response = with_token(app.server.post("/teams/api/teams"), &owner_token)
        .json(&json!({"name": "Red Team"}))
        .await;
    let team: Value = response.json();
    let team_id = team["id"].as_str().unwrap().to_string();

    let response = with_token(
        app.server.post(&format!("/teams/api/teams/{}/invitations", team_id)),
        &owner_token,
    )
    .json(&json!({"email": "bob@example.com"}))
    .await;
    let invitation: Value = response.json();
    with_token(
        app.server.post(&format!(
            "/teams/api/user/invitations/{}/accept-invitation",
            invitation["id"].as_str().unwrap()
        )),
        &bob_token,
    )
    .await;

    let response = with_token(
        app.server.post(&format!("/teams/api/teams/{}/change-role", team_id)),
        &bob_token,
    )
    .json(&json!({"user_id": owner.id, "role": "member"}))
    .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = with_token(
        app.server.post(&format!("/teams/api/teams/{}/leave-team", team_id)),
        &bob_token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "success");

    let response = with_token(
        app.server.post(&format!("/teams/api/teams/{}/leave-team", team_id)),
        &owner_token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_complete_registration_creates_team() -> Result<()> {
    let app = setup_test_app().await?;
    let (_, token) = create_user(&app, "new@example.com", false).await?;

    let response = with_token(app.server.post("/teams/api/user/complete-registration"), &token)
        .json(&json!({"team": {"name": "First Team"}}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert!(body["team_id"].is_string());

    let response = with_token(app.server.get("/teams/api/teams"), &token).await;
    let teams: Vec<Value> = response.json();
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0]["name"], "First Team");

    Ok(())
}

#[tokio::test]
async fn test_admin_endpoints_require_staff() -> Result<()> {
    let app = setup_test_app().await?;
    let (_, user_token) = create_user(&app, "user@example.com", false).await?;
    let (_, staff_token) = create_user(&app, "staff@example.com", true).await?;

    let response = with_token(app.server.get("/teams/api/admin"), &user_token).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["detail"], "You do not have permission to perform this action.");

    with_token(app.server.post("/teams/api/teams"), &user_token)
        .json(&json!({"name": "Customer Team"}))
        .await;

    let response = with_token(app.server.get("/teams/api/admin"), &staff_token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let teams: Vec<Value> = response.json();
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0]["user_emails"], json!(["user@example.com"]));

    let response = with_token(app.server.post("/users/admin/token"), &staff_token).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["token"], staff_token);

    let response = with_token(app.server.get("/users/admin-user-management"), &staff_token)
        .add_query_param("search", "user@")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let users: Vec<Value> = response.json();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["teams"][0]["name"], "Customer Team");

    Ok(())
}

#[tokio::test]
async fn test_staff_change_without_auth0_link() -> Result<()> {
    let app = setup_test_app().await?;
    let (_, staff_token) = create_user(&app, "staff@example.com", true).await?;
    let (user, _) = create_user(&app, "user@example.com", false).await?;

    let response = with_token(
        app.server.post(&format!("/users/admin-user-management/{}/remove-staff", user.id)),
        &staff_token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body, json!({"status": "success"}));

    let response = with_token(
        app.server.post(&format!("/users/admin-user-management/{}/make-staff", user.id)),
        &staff_token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["detail"], "User made admin successfully");

    Ok(())
}

#[tokio::test]
async fn test_subscription_config_and_products() -> Result<()> {
    let app = setup_test_app().await?;
    let (_, staff_token) = create_user(&app, "staff@example.com", true).await?;
    let (_, user_token) = create_user(&app, "user@example.com", false).await?;

    let response = with_token(app.server.put("/subscriptions/api/admin/config"), &user_token)
        .json(&json!({"trial_days": "14"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = with_token(app.server.put("/subscriptions/api/admin/config"), &staff_token)
        .json(&json!({"trial_days": "14", "default_price_id": "price_123"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let config: Value = response.json();
    assert_eq!(config["trial_days"], "14");
    assert_eq!(config["default_price_id"], "price_123");

    let response = with_token(app.server.get("/subscriptions/api/products"), &user_token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let products: Vec<Value> = response.json();
    assert!(products.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_portal_without_subscription() -> Result<()> {
    let app = setup_test_app().await?;
    let (_, token) = create_user(&app, "owner@example.com", false).await?;

    let response = with_token(app.server.post("/teams/api/teams"), &token)
        .json(&json!({"name": "Red Team"}))
        .await;
    let team: Value = response.json();
    let team_id = team["id"].as_str().unwrap();

    let response = with_token(
        app.server.post(&format!(
            "/team-management/{}/subscription/init/create-portal-session",
            team_id
        )),
        &token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(
        body["detail"],
        "Whoops, we couldn't find a subscription associated with your account!"
    );

    let response = with_token(
        app.server.get(&format!(
            "/team-management/{}/subscription/init/active-subscription",
            team_id
        )),
        &token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert!(body.is_null());

    Ok(())
}

#[tokio::test]
async fn test_schema_routes() -> Result<()> {
    let app = setup_test_app().await?;
    let (_, user_token) = create_user(&app, "user@example.com", false).await?;
    let (_, staff_token) = create_user(&app, "staff@example.com", true).await?;

    let response = app.server.get("/vulmatch_api/schema/schema-json").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);

    let stored = json!({
        "paths": {"/vulmatch_api/api/v1/cve/": {"get": {"responses": {"200": {
            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/CVE"}}}
        }}}}},
        "components": {"schemas": {"CVE": {"type": "object"}, "Unused": {"type": "object"}}}
    });
    std::fs::write(
        app.schema_dir.path().join("schema.json"),
        serde_json::to_string(&stored)?,
    )?;
    std::fs::write(
        app.schema_dir.path().join("admin-schema.json"),
        serde_json::to_string(&json!({"paths": {}, "components": {}}))?,
    )?;

    let response = app.server.get("/vulmatch_api/api/schema/schema-json").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let document: Value = response.json();
    assert_eq!(document["info"]["title"], "Vulmatch Web API");
    assert!(document["paths"]["/v1/cve/"].is_object());
    assert!(document["components"]["schemas"].get("Unused").is_none());

    let response =
        with_token(app.server.get("/vulmatch_api/admin/schema/schema-json"), &user_token).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response =
        with_token(app.server.get("/vulmatch_api/admin/schema/schema-json"), &staff_token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let document: Value = response.json();
    let operation = &document["paths"]["/users/admin/token"]["post"];
    assert_eq!(operation["operationId"], "users_admin_token_create");
    assert_eq!(
        document["components"]["securitySchemes"]["api_key"]["name"],
        "Authorization"
    );

    Ok(())
}

#[tokio::test]
async fn test_swagger_ui_routes() -> Result<()> {
    let app = setup_test_app().await?;
    let (_, user_token) = create_user(&app, "user@example.com", false).await?;
    let (_, staff_token) = create_user(&app, "staff@example.com", true).await?;

    let response = app.server.get("/vulmatch_api/api/schema/swagger-ui/").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let admin_ui = "/vulmatch_api/admin/schema/swagger-ui/";
    let response = app.server.get(admin_ui).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = with_token(app.server.get(admin_ui), &user_token).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = with_token(app.server.get(admin_ui), &staff_token).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    Ok(())
}
