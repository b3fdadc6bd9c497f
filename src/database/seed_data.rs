use anyhow::Result;
use chrono::Utc;
use sea_orm::*;
use tracing::info;

use crate::database::entities::users;

/// Creates (or promotes) a staff account so the admin API can be used on a
/// fresh deployment.
pub async fn ensure_staff_user(db: &DatabaseConnection, email: &str) -> Result<users::Model> {
    let existing = users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .one(db)
        .await?;

    if let Some(user) = existing {
        if user.is_staff && user.is_superuser {
            info!("Staff user {} already exists, skipping", email);
            return Ok(user);
        }

        info!("Promoting existing user {} to staff", email);
        let mut active: users::ActiveModel = user.into();
        active.is_staff = Set(true);
        active.is_superuser = Set(true);
        return Ok(active.update(db).await?);
    }

    info!("Creating staff user {}", email);
    let mut user = users::ActiveModel::new(email, email);
    user.is_staff = Set(true);
    user.is_superuser = Set(true);
    user.date_joined = Set(Utc::now());
    Ok(user.insert(db).await?)
}
