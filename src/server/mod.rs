pub mod app;
pub mod handlers;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

use crate::config::Settings;
use crate::database::{connection::*, migrations::Migrator};
use crate::jobs::CveSyncJob;
use anyhow::Result;
use sea_orm_migration::prelude::*;
use tracing::{info, warn};

pub async fn start_server(settings: Settings) -> Result<()> {
    let database_url = get_database_url(Some(&settings.database_url));
    let db = establish_connection(&database_url).await?;

    Migrator::up(&db, None).await?;
    info!("Database migrations completed");

    let port = settings.port;
    let state = app::AppState::new(db, settings);

    if state.settings.cve_sync_enabled {
        if state.vulmatch.is_configured() {
            CveSyncJob::new(state.vulmatch.clone()).spawn_daily();
            info!("Daily CVE sync scheduled");
        } else {
            warn!("CVE sync enabled but VULMATCH_SERVICE_BASE_URL is not set");
        }
    }

    let app = app::create_app(state)?;

    log_routes();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_routes() {
    info!("API Endpoints:");
    info!("  /health                                 - Health check");
    info!("  /rest-auth/auth0                        - Auth0 login");
    info!("  /teams/api/*                            - Teams, invitations, API keys");
    info!("  /team-management/{{id}}/subscription/init - Team subscription");
    info!("  /subscriptions/api/*                    - Products and billing config");
    info!("  /users/*                                - User management");
    info!("  /stripe/webhook                         - Stripe events");
    info!("  /vulmatch_api/api/v1/*                  - Vulmatch API (API-KEY)");
    info!("  /vulmatch_api/admin/api/v1/*            - Vulmatch admin API (staff)");
    #[cfg(feature = "swagger-ui")]
    info!("  /vulmatch_api/api/schema/swagger-ui     - Swagger UI documentation");
}

pub async fn migrate_database(database_url: &str, direction: MigrateDirection) -> Result<()> {
    let database_url = get_database_url(Some(database_url));
    let db = establish_connection(&database_url).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Running fresh migrations (down then up)");
            Migrator::down(&db, None).await?;
            Migrator::up(&db, None).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}
