use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use whisker_core::{LoggingConfig, WhiskerConfig};
use whisker_gateway::{CatService, FeedClient, PetClient};
use whisker_limbic::Cat;
use whisker_memory::SqliteStore;

#[derive(Parser, Debug)]
#[command(name = "whisker", author, version, about = "A virtual cat you can pet over TCP and feed over UDP")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true, env = "WHISKER_CONFIG", default_value = "whisker.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the cat service until the process is killed
    Serve,

    /// Pet the cat on behalf of one or more people
    Pet {
        #[arg(required = true)]
        names: Vec<String>,

        /// Pet channel address (default: host and tcp_port from the config)
        #[arg(long)]
        addr: Option<String>,

        /// How long to wait for the cat's reply
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },

    /// Offer the cat some food
    Feed {
        name: String,
        food: String,

        /// Feed channel address (default: host and udp_port from the config)
        #[arg(long)]
        addr: Option<String>,

        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = WhiskerConfig::load_or_default(&cli.config);

    match cli.command {
        Command::Serve => {
            let _guard = init_service_logging(&config.logging)?;
            serve(config).await
        }
        Command::Pet { names, addr, timeout_ms } => {
            init_client_logging(&config.logging);
            let addr = addr.unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.tcp_port));
            let mut client = PetClient::connect(&addr).await?;
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            client.pet(&names).await?;
            print_reply(client.read_response(Duration::from_millis(timeout_ms)).await?);
            Ok(())
        }
        Command::Feed { name, food, addr, timeout_ms } => {
            init_client_logging(&config.logging);
            let addr = addr.unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.udp_port));
            let client = FeedClient::connect(&addr).await?;
            client.feed(&name, &food).await?;
            print_reply(client.read_response(Duration::from_millis(timeout_ms)).await?);
            Ok(())
        }
    }
}

async fn serve(config: WhiskerConfig) -> Result<()> {
    info!("Opening record store at {}...", config.store.db_path);
    let store = Arc::new(SqliteStore::new(&config.store.db_path).await?);

    let cat = Arc::new(Cat::new(store, config.cat.clone()));
    let service = CatService::bind(&config.server, cat).await?;
    service.run().await
}

fn print_reply(reply: Option<String>) {
    match reply {
        Some(text) => println!("{}", text),
        None => println!("(no reply from the cat)"),
    }
}

/// `LOG_LEVEL` (already folded into the config) wins, then `RUST_LOG`, then the config file.
fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    if std::env::var_os("LOG_LEVEL").is_none() {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
    }
    EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Stdout plus a daily-rolling file. Keep the guard alive or buffered lines are lost.
fn init_service_logging(logging: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&logging.dir)
        .with_context(|| format!("Failed to create log directory {}", logging.dir))?;
    let file_appender = tracing_appender::rolling::daily(&logging.dir, &logging.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter(logging))
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();
    Ok(guard)
}

fn init_client_logging(logging: &LoggingConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(logging))
        .with_writer(std::io::stderr)
        .init();
}
