use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_BLOCKED: &str = "blocked";

/// Per-team credential for the proxied Vulmatch API. Only the SHA-256 of the
/// clear key is stored.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "team_api_keys")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub key_id: Uuid,
    #[sea_orm(unique)]
    pub prefix: String,
    #[serde(skip_serializing)]
    pub hashed_key: String,
    pub name: String,
    pub revoked: bool,
    pub expiry_date: Option<ChronoDateTimeUtc>,
    pub status: String,
    pub last_used: Option<ChronoDateTimeUtc>,
    pub user_id: Uuid,
    pub team_id: Uuid,
    pub membership_id: i32,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::teams::Entity",
        from = "Column::TeamId",
        to = "super::teams::Column::Id",
        on_delete = "Cascade"
    )]
    Teams,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(
        belongs_to = "super::memberships::Entity",
        from = "Column::MembershipId",
        to = "super::memberships::Column::Id",
        on_delete = "Cascade"
    )]
    Memberships,
}

impl Related<super::teams::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teams.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_date
            .map(|expiry| expiry <= chrono::Utc::now())
            .unwrap_or(false)
    }
}
