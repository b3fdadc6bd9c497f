use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use vulmatch_web::clients::VulmatchClient;
use vulmatch_web::config::Settings;
use vulmatch_web::database::{establish_connection, get_database_url, seed_data, setup_database};
use vulmatch_web::jobs::CveSyncJob;
use vulmatch_web::{openapi, server};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    /// TOML settings file; environment variables override its values.
    #[clap(short, long, global = true, env = "VULMATCH_WEB_CONFIG")]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Serve {
        #[clap(short, long)]
        port: Option<u16>,
        #[clap(short, long)]
        database: Option<String>,
        #[clap(long)]
        cors_origin: Option<String>,
    },
    Migrate {
        #[clap(subcommand)]
        direction: server::MigrateDirection,
        #[clap(short, long)]
        database: Option<String>,
    },
    /// Fetches the upstream schema and writes the public and admin documents.
    GenerateSchema,
    /// Runs the CVE download and processor chain once for yesterday.
    SyncCves,
    CreateStaff {
        #[clap(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let mut settings = Settings::load(args.config.as_deref())?;

    match args.command {
        Commands::Serve {
            port,
            database,
            cors_origin,
        } => {
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(database) = database {
                settings.database_url = database;
            }
            if cors_origin.is_some() {
                settings.cors_origin = cors_origin;
            }
            info!("Starting server on port {}", settings.port);
            server::start_server(settings).await?;
        }
        Commands::Migrate {
            direction,
            database,
        } => {
            let database = database.unwrap_or(settings.database_url);
            info!("Running database migration: {:?}", direction);
            server::migrate_database(&database, direction).await?;
        }
        Commands::GenerateSchema => {
            info!("Generating API schemas into {}", settings.schema_dir.display());
            openapi::generator::generate(&settings).await?;
        }
        Commands::SyncCves => {
            let job = CveSyncJob::new(VulmatchClient::from_settings(&settings));
            job.run_once().await?;
        }
        Commands::CreateStaff { email } => {
            let db = establish_connection(&get_database_url(Some(&settings.database_url))).await?;
            setup_database(&db).await?;
            let user = seed_data::ensure_staff_user(&db, &email).await?;
            info!("Staff user {} ready", user.id);
        }
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("handlebars=off,{}", log_level)))
        .without_time()
        .init();
}
