use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use journal_goals::{api, db};

#[derive(Parser)]
#[command(name = "journal-goals")]
#[command(about = "Daily reading goals for the journaling backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// SQLite database file (defaults to the platform data directory)
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Apply pending database migrations and exit
    Migrate {
        /// SQLite database file (defaults to the platform data directory)
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "journal_goals=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Open the database at `path`, then `JOURNAL_GOALS_DB`, then the platform
/// default, and bring its schema up to date.
fn open_database(path: Option<PathBuf>) -> anyhow::Result<db::Database> {
    let path = match path.or_else(|| std::env::var_os("JOURNAL_GOALS_DB").map(PathBuf::from)) {
        Some(path) => path,
        None => db::Database::default_path()?,
    };
    tracing::info!("Using database at {}", path.display());

    let db = db::Database::open(path)?;
    db.migrate()?;
    Ok(db)
}

async fn serve(host: &str, port: u16, database: Option<PathBuf>) -> anyhow::Result<()> {
    let db = open_database(database)?;
    let app = api::create_router_with_config(db, api::SecurityConfig::from_env());

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("journal-goals listening on http://{}:{}", host, port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve {
            port,
            host,
            database,
        }) => serve(&host, port, database).await?,
        Some(Commands::Migrate { database }) => {
            open_database(database)?;
            tracing::info!("Migrations complete");
        }
        None => serve("127.0.0.1", 3000, None).await?,
    }

    Ok(())
}
