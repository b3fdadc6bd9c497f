//! Database functionality tests
//!
//! Tests for migrations, entity relationships and data integrity

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, Set,
};
use tempfile::NamedTempFile;
use uuid::Uuid;

use vulmatch_web::database::entities::*;
use vulmatch_web::database::{seed_data, setup_database};

/// Create a test database connection with migrations
async fn setup_test_db() -> Result<(DatabaseConnection, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());

    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;

    Ok((db, temp_file))
}

async fn insert_user(db: &DatabaseConnection, email: &str) -> Result<users::Model> {
    Ok(users::ActiveModel::new(email, email).insert(db).await?)
}

async fn insert_team(db: &DatabaseConnection, owner: &users::Model) -> Result<teams::Model> {
    let now = Utc::now();
    let team = teams::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Research".to_string()),
        slug: Set(None),
        description: Set(None),
        owner_id: Set(Some(owner.id)),
        is_private: Set(false),
        customer_id: Set(None),
        subscription_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    memberships::ActiveModel {
        team_id: Set(team.id),
        user_id: Set(owner.id),
        role: Set("owner".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(team)
}

#[tokio::test]
async fn test_database_migrations() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;

    assert!(users::Entity::find().all(&db).await?.is_empty());
    assert!(auth_tokens::Entity::find().all(&db).await?.is_empty());
    assert!(social_accounts::Entity::find().all(&db).await?.is_empty());
    assert!(teams::Entity::find().all(&db).await?.is_empty());
    assert!(memberships::Entity::find().all(&db).await?.is_empty());
    assert!(invitations::Entity::find().all(&db).await?.is_empty());
    assert!(team_api_keys::Entity::find().all(&db).await?.is_empty());
    assert!(stripe_products::Entity::find().all(&db).await?.is_empty());
    assert!(stripe_prices::Entity::find().all(&db).await?.is_empty());
    assert!(stripe_subscriptions::Entity::find().all(&db).await?.is_empty());

    // Running the migrator again is a no-op
    setup_database(&db).await?;

    Ok(())
}

#[tokio::test]
async fn test_team_relationships() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let owner = insert_user(&db, "owner@example.com").await?;
    let team = insert_team(&db, &owner).await?;

    let members = team.find_related(memberships::Entity).all(&db).await?;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, owner.id);
    assert_eq!(members[0].role, "owner");

    let now = Utc::now();
    invitations::ActiveModel {
        id: Set(Uuid::new_v4()),
        team_id: Set(team.id),
        email: Set("bob@example.com".to_string()),
        role: Set("member".to_string()),
        invited_by: Set(owner.id),
        is_accepted: Set(false),
        is_cancelled: Set(false),
        accepted_by: Set(None),
        last_email_date: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&db)
    .await?;

    let pending: Vec<_> = team
        .find_related(invitations::Entity)
        .all(&db)
        .await?
        .into_iter()
        .filter(|invitation| invitation.is_pending())
        .collect();
    assert_eq!(pending.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_membership_is_rejected() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let owner = insert_user(&db, "owner@example.com").await?;
    let team = insert_team(&db, &owner).await?;

    let now = Utc::now();
    let duplicate = memberships::ActiveModel {
        team_id: Set(team.id),
        user_id: Set(owner.id),
        role: Set("member".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&db)
    .await;
    assert!(duplicate.is_err());

    Ok(())
}

#[tokio::test]
async fn test_team_delete_cascades() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let owner = insert_user(&db, "owner@example.com").await?;
    let team = insert_team(&db, &owner).await?;
    let team_id = team.id;

    team.delete(&db).await?;

    let remaining = memberships::Entity::find()
        .filter(memberships::Column::TeamId.eq(team_id))
        .all(&db)
        .await?;
    assert!(remaining.is_empty());
    assert!(users::Entity::find_by_id(owner.id).one(&db).await?.is_some());

    Ok(())
}

#[tokio::test]
async fn test_subscription_config_is_seeded() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;

    let rows = subscription_config::Entity::find().all(&db).await?;
    assert_eq!(rows.len(), 3);

    let minutes = subscription_config::Entity::find_by_id(subscription_config::KEY_TRIAL_MINUTES.to_string())
        .one(&db)
        .await?
        .unwrap();
    assert_eq!(minutes.value, "10");
    assert!(
        subscription_config::Entity::find_by_id(subscription_config::KEY_DEFAULT_PRICE_ID.to_string())
            .one(&db)
            .await?
            .is_none()
    );

    Ok(())
}

#[tokio::test]
async fn test_ensure_staff_user() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;

    let created = seed_data::ensure_staff_user(&db, "admin@example.com").await?;
    assert!(created.is_staff);
    assert!(created.is_superuser);

    let again = seed_data::ensure_staff_user(&db, "admin@example.com").await?;
    assert_eq!(again.id, created.id);
    assert_eq!(users::Entity::find().all(&db).await?.len(), 1);

    let regular = insert_user(&db, "someone@example.com").await?;
    assert!(!regular.is_staff);
    let promoted = seed_data::ensure_staff_user(&db, "someone@example.com").await?;
    assert_eq!(promoted.id, regular.id);
    assert!(promoted.is_staff);

    Ok(())
}
