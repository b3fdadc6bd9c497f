#![allow(dead_code)]

use anyhow::Result;
use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, IntoActiveModel, Set};
use serde_json::json;
use tempfile::{NamedTempFile, TempDir};
use uuid::Uuid;

use vulmatch_web::config::Settings;
use vulmatch_web::database::entities::{stripe_products, stripe_subscriptions, teams, users};
use vulmatch_web::database::setup_database;
use vulmatch_web::server::app::{create_app, AppState};

pub struct TestApp {
    pub server: TestServer,
    pub db: DatabaseConnection,
    pub state: AppState,
    pub schema_dir: TempDir,
    _db_file: NamedTempFile,
}

pub fn test_settings(schema_dir: &TempDir) -> Settings {
    Settings {
        schema_dir: schema_dir.path().to_path_buf(),
        frontend_base_url: "https://app.example".to_string(),
        ..Settings::default()
    }
}

pub async fn setup_test_app() -> Result<TestApp> {
    setup_test_app_with(|_| {}).await
}

/// Test server on a temporary SQLite file; `configure` adjusts the settings
/// before the app is built.
pub async fn setup_test_app_with<F>(configure: F) -> Result<TestApp>
where
    F: FnOnce(&mut Settings),
{
    let db_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", db_file.path().display());
    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;

    let schema_dir = tempfile::tempdir()?;
    let mut settings = test_settings(&schema_dir);
    configure(&mut settings);

    let state = AppState::new(db.clone(), settings);
    let server = TestServer::new(create_app(state.clone())?)?;

    Ok(TestApp {
        server,
        db,
        state,
        schema_dir,
        _db_file: db_file,
    })
}

/// Inserts a user and issues their API token.
pub async fn create_user(app: &TestApp, email: &str, is_staff: bool) -> Result<(users::Model, String)> {
    let mut user = users::ActiveModel::new(email, email);
    user.is_staff = Set(is_staff);
    user.is_superuser = Set(is_staff);
    let user = user.insert(&app.db).await?;

    let token = app.state.auth_service().get_or_create_token(user.id).await?;
    Ok((user, token.key))
}

pub fn with_token(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&format!("Token {}", token)).expect("valid header"),
    )
}

pub fn with_api_key(request: TestRequest, key: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("api-key"),
        HeaderValue::from_str(key).expect("valid header"),
    )
}

/// Puts `team_id` on an active subscription of a product with the given
/// entitlements.
pub async fn subscribe_team(
    db: &DatabaseConnection,
    team_id: Uuid,
    allowed_api_access: &str,
    allowed_user_count: &str,
) -> Result<stripe_subscriptions::Model> {
    let now = Utc::now();
    let product_id = format!("prod_{}", Uuid::new_v4().simple());
    stripe_products::ActiveModel {
        id: Set(product_id.clone()),
        name: Set("Team plan".to_string()),
        description: Set(None),
        active: Set(true),
        metadata: Set(json!({
            "allowed_api_access": allowed_api_access,
            "allowed_user_count": allowed_user_count,
        })),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    let subscription = stripe_subscriptions::ActiveModel {
        id: Set(format!("sub_{}", Uuid::new_v4().simple())),
        customer_id: Set("cus_test".to_string()),
        status: Set("active".to_string()),
        item_id: Set(None),
        price_id: Set(None),
        product_id: Set(Some(product_id)),
        quantity: Set(Some(1)),
        start_date: Set(Some(now)),
        current_period_start: Set(Some(now)),
        current_period_end: Set(None),
        trial_end: Set(None),
        cancel_at_period_end: Set(false),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    let team = teams::Entity::find_by_id(team_id)
        .one(db)
        .await?
        .expect("team exists");
    let mut team = team.into_active_model();
    team.subscription_id = Set(Some(subscription.id.clone()));
    team.customer_id = Set(Some("cus_test".to_string()));
    team.update(db).await?;

    Ok(subscription)
}
