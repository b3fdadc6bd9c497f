use sea_orm_migration::prelude::*;

mod m001_create_accounts;
mod m002_create_teams;
mod m003_create_billing;
mod m004_create_team_api_keys;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m001_create_accounts::Migration),
            Box::new(m002_create_teams::Migration),
            Box::new(m003_create_billing::Migration),
            Box::new(m004_create_team_api_keys::Migration),
        ]
    }
}
