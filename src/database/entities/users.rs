use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: ChronoDateTimeUtc,
    pub last_login: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::memberships::Entity")]
    Memberships,
    #[sea_orm(has_many = "super::social_accounts::Entity")]
    SocialAccounts,
    #[sea_orm(has_one = "super::auth_tokens::Entity")]
    AuthTokens,
}

impl Related<super::memberships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl Related<super::social_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SocialAccounts.def()
    }
}

impl Related<super::teams::Entity> for Entity {
    fn to() -> RelationDef {
        super::memberships::Relation::Teams.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::memberships::Relation::Users.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn new(email: &str, username: &str) -> Self {
        Self {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            is_staff: Set(false),
            is_superuser: Set(false),
            is_active: Set(true),
            date_joined: Set(chrono::Utc::now()),
            last_login: ActiveValue::NotSet,
        }
    }
}

impl Model {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Full name when set, otherwise email, otherwise username.
    pub fn display_name(&self) -> String {
        let full_name = self.full_name();
        if !full_name.is_empty() {
            return full_name;
        }
        if !self.email.is_empty() {
            return self.email.clone();
        }
        self.username.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str, email: &str) -> Model {
        Model {
            id: Uuid::new_v4(),
            username: "jdoe".to_string(),
            email: email.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            is_staff: false,
            is_superuser: false,
            is_active: true,
            date_joined: chrono::Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(user("Jane", "Doe", "jane@x.io").display_name(), "Jane Doe");
        assert_eq!(user(" ", "", "jane@x.io").display_name(), "jane@x.io");
        assert_eq!(user("", "", "").display_name(), "jdoe");
    }
}
