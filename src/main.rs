use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use diskon_sync::models::{ApiConfigUpdate, Discount, DiscountPayload, DiscountType};
use diskon_sync::storage::{KeyValueStore, MemoryStore, SqliteStore};
use diskon_sync::{ApiClient, ConfigStore, Defaults, DiscountStore};

const DEFAULT_DATABASE_URL: &str = "sqlite:database/diskon.db";

#[derive(Parser)]
#[command(name = "diskon", about = "Manage discount records on the remote API")]
struct Cli {
    /// Keep settings in memory instead of the SQLite database
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all discounts
    List,
    /// Search discounts by name or description
    Search { query: String },
    /// Show one discount
    Show { id: String },
    /// Create a discount
    Add {
        name: String,
        #[arg(long = "type")]
        kind: DiscountType,
        #[arg(long)]
        value: f64,
        #[arg(long)]
        description: Option<String>,
    },
    /// Update a discount; omitted fields keep their current value
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type")]
        kind: Option<DiscountType>,
        #[arg(long)]
        value: Option<f64>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a discount
    Delete { id: String },
    /// Show counts per discount type
    Stats {
        /// Count straight from the server instead of the local view
        #[arg(long)]
        remote: bool,
    },
    /// Probe the API with the configured base URL and token
    Test,
    /// Inspect or change connection settings
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    Set {
        #[arg(long)]
        base_url: String,
        #[arg(long)]
        token: String,
    },
    SetUrl { url: String },
    Reset,
}

async fn open_storage(ephemeral: bool) -> Result<Arc<dyn KeyValueStore>> {
    if ephemeral {
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db_url =
        std::env::var("DISKON_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    if let Some(parent) = db_url
        .strip_prefix("sqlite:")
        .and_then(|path| Path::new(path).parent())
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    Ok(Arc::new(SqliteStore::open(&db_url).await?))
}

fn print_discount(discount: &Discount) {
    let value = match discount.kind {
        DiscountType::Percentage => format!("{}%", discount.value),
        DiscountType::Fixed => format!("{}", discount.value),
    };
    println!(
        "{:<26} {:<28} {:<11} {:>10}  {}",
        discount.id,
        discount.name,
        discount.kind,
        value,
        discount.description.as_deref().unwrap_or("-")
    );
}

fn report_refresh(store: &DiscountStore) {
    if let Some(message) = store.error() {
        warn!("Refresh failed: {}", message);
        eprintln!("{message}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let storage = open_storage(cli.ephemeral).await?;
    let config = ConfigStore::new(storage, Defaults::from_env()).await?;
    let mut store = DiscountStore::new(ApiClient::new()?, config);

    match cli.command {
        Command::List => {
            store.refresh().await;
            report_refresh(&store);
            store.records().iter().for_each(print_discount);
        }
        Command::Search { query } => {
            store.refresh().await;
            report_refresh(&store);
            store.search(&query).into_iter().for_each(print_discount);
        }
        Command::Show { id } => {
            store.refresh().await;
            report_refresh(&store);
            let discount = store
                .find_by_id(&id)
                .ok_or_else(|| anyhow!("Diskon {id} tidak ditemukan"))?;
            println!("{}", serde_json::to_string_pretty(discount)?);
        }
        Command::Add {
            name,
            kind,
            value,
            description,
        } => {
            store.refresh().await;
            let created = store
                .create(DiscountPayload {
                    name,
                    kind,
                    value,
                    description,
                })
                .await?;
            info!("Created {}", created.id);
            print_discount(&created);
        }
        Command::Edit {
            id,
            name,
            kind,
            value,
            description,
        } => {
            store.refresh().await;
            let current = store
                .find_by_id(&id)
                .cloned()
                .ok_or_else(|| anyhow!("Diskon {id} tidak ditemukan"))?;
            let updated = store
                .update(
                    &id,
                    DiscountPayload {
                        name: name.unwrap_or(current.name),
                        kind: kind.unwrap_or(current.kind),
                        value: value.unwrap_or(current.value),
                        description: description.or(current.description),
                    },
                )
                .await?;
            print_discount(&updated);
        }
        Command::Delete { id } => {
            store.refresh().await;
            store.remove(&id).await?;
            println!("Deleted {id}");
        }
        Command::Stats { remote } => {
            let stats = if remote {
                store.remote_stats().await
            } else {
                store.refresh().await;
                report_refresh(&store);
                store.stats()
            };
            println!(
                "total: {}  percentage: {}  fixed: {}",
                stats.total, stats.by_type.percentage, stats.by_type.fixed
            );
        }
        Command::Test => {
            let result = store.test_api_connection().await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Config { action } => match action {
            ConfigCommand::Show => {
                println!("{}", serde_json::to_string_pretty(&store.api_config())?);
            }
            ConfigCommand::Set { base_url, token } => {
                store
                    .update_api_config(ApiConfigUpdate {
                        base_url: Some(base_url),
                        token: Some(token),
                        full_url: None,
                    })
                    .await?;
                report_refresh(&store);
                println!("{}", serde_json::to_string_pretty(&store.api_config())?);
            }
            ConfigCommand::SetUrl { url } => {
                store
                    .update_api_config(ApiConfigUpdate {
                        full_url: Some(url),
                        ..Default::default()
                    })
                    .await?;
                report_refresh(&store);
                println!("{}", serde_json::to_string_pretty(&store.api_config())?);
            }
            ConfigCommand::Reset => {
                store.reset_api_config().await?;
                println!("{}", serde_json::to_string_pretty(&store.api_config())?);
            }
        },
    }

    Ok(())
}
