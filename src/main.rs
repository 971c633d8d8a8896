use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use dbseed::application::loader;
use dbseed::domain::error::Result;
use dbseed::infrastructure::config::PgConfig;
use dbseed::infrastructure::db::postgres::wait_for_postgres;
use dbseed::infrastructure::db::{PgStore, SqliteStore};

#[derive(Parser)]
#[command(
    name = "dbseed",
    version,
    about = "Seed a PostgreSQL or SQLite database from a directory of CSV files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load CSV files into a PostgreSQL schema (connection via POSTGRES_* env vars)
    Postgres {
        /// Directory containing the CSV files to load
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Target schema; each file becomes a table inside it
        #[arg(long, default_value = "olist_data")]
        schema: String,

        /// Connection attempts (one per second) before giving up
        #[arg(long, default_value_t = 30)]
        wait_retries: u32,
    },
    /// Load CSV files into a local SQLite database file
    Sqlite {
        /// Directory containing the CSV files to load
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// SQLite database file, created if missing
        #[arg(long, default_value = "data/workshop.db")]
        db_file: PathBuf,

        /// Table-name prefix standing in for a schema
        #[arg(long, default_value = "olist_data")]
        schema: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Postgres {
            data_dir,
            schema,
            wait_retries,
        } => {
            let config = PgConfig::from_env()?;
            wait_for_postgres(&config, wait_retries).await?;

            let mut store = PgStore::connect(&config, schema).await?;
            let outcome = loader::run(&data_dir, &mut store).await;
            store.close().await;
            outcome?;
        }
        Command::Sqlite {
            data_dir,
            db_file,
            schema,
        } => {
            let mut store = SqliteStore::open(&db_file, schema).await?;
            let outcome = loader::run(&data_dir, &mut store).await;
            store.close().await;
            outcome?;
        }
    }
    Ok(())
}
