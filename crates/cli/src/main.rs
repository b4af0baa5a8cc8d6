mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use settings::{Settings, DEFAULT_JWT_SECRET};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;
use tickerchat_api::{build_router, start_server, AppState};
use tickerchat_auth::JwtAuth;
use tickerchat_core::{ChatStore, QuoteSource, UserStore};
use tickerchat_data::{
    HttpQuoteSource, MemoryChatStore, MemoryUserStore, PostgresChatStore, PostgresUserStore,
    SyntheticQuoteSource,
};
use tickerchat_hub::{Hub, QuotePoller, RelayMode};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "tickerchat")]
#[command(about = "Real-time chat relay with a live stock ticker feed")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Path to a TOML settings file
    #[arg(short, long, env = "TICKERCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Server {
        /// Bind address
        #[arg(short, long, env = "BIND")]
        bind: Option<String>,

        /// Listen port
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Token signing secret
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        jwt_secret: Option<String>,

        /// Allowed browser origin
        #[arg(long, env = "CORS_ORIGIN")]
        cors_origin: Option<String>,

        /// Fetch ticker quotes from this server instead of generating them
        #[arg(long, env = "SERVER_URL")]
        server_url: Option<String>,

        /// echo or exclude_sender
        #[arg(long, env = "RELAY_MODE")]
        relay_mode: Option<RelayMode>,

        /// Require a token to open a WebSocket
        #[arg(long)]
        require_ws_auth: bool,

        /// Do not start the quote poller
        #[arg(long)]
        no_poller: bool,
    },

    /// Fetch one quote from the configured source and print it
    Quote {
        /// Ticker symbol (e.g. "AAPL", "BTC-USD")
        symbol: String,

        /// Fetch from this server instead of generating locally
        #[arg(long, env = "SERVER_URL")]
        server_url: Option<String>,
    },

    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    match cli.log_format {
        LogFormat::Json => fmt().json().with_env_filter(filter).with_target(false).init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(false).init(),
    }

    let mut settings = Settings::load(cli.config.as_deref())?;
    if cli.database_url.is_some() {
        settings.database.url = cli.database_url;
    }

    match cli.command {
        Commands::Server {
            bind,
            port,
            jwt_secret,
            cors_origin,
            server_url,
            relay_mode,
            require_ws_auth,
            no_poller,
        } => {
            if let Some(bind) = bind {
                settings.server.bind = bind;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            if let Some(secret) = jwt_secret {
                settings.auth.jwt_secret = secret;
            }
            if cors_origin.is_some() {
                settings.server.cors_origin = cors_origin;
            }
            if server_url.is_some() {
                settings.poller.server_url = server_url;
            }
            if let Some(mode) = relay_mode {
                settings.hub.relay_mode = mode;
            }
            settings.server.require_ws_auth |= require_ws_auth;
            if no_poller {
                settings.poller.enabled = false;
            }
            run_server(settings).await?;
        }
        Commands::Quote { symbol, server_url } => {
            if server_url.is_some() {
                settings.poller.server_url = server_url;
            }
            let source = quote_source(&settings)?;
            let quote = source.fetch_quote(&symbol).await?;
            println!("{}", serde_json::to_string_pretty(&quote)?);
        }
        Commands::Migrate => {
            let Some(url) = settings.database.url.as_deref() else {
                anyhow::bail!("No database configured (set DATABASE_URL or [database].url)");
            };
            connect_database(url, settings.database.max_connections).await?;
            println!("Migrations applied");
        }
    }

    Ok(())
}

async fn run_server(settings: Settings) -> Result<()> {
    let (users, chats): (Arc<dyn UserStore>, Arc<dyn ChatStore>) =
        match settings.database.url.as_deref() {
            Some(url) => {
                let pool = connect_database(url, settings.database.max_connections).await?;
                (
                    Arc::new(PostgresUserStore::new(pool.clone())),
                    Arc::new(PostgresChatStore::new(pool)),
                )
            }
            None => {
                tracing::warn!("No database configured; accounts and chat history are kept in memory");
                (
                    Arc::new(MemoryUserStore::new()),
                    Arc::new(MemoryChatStore::new()),
                )
            }
        };

    if settings.auth.jwt_secret == DEFAULT_JWT_SECRET {
        tracing::warn!("Using the default JWT secret; set JWT_SECRET outside local development");
    }

    let hub = Arc::new(Hub::new(settings.hub_config(), Arc::clone(&chats)));
    tracing::info!(
        relay_mode = %settings.hub.relay_mode,
        outbound_queue = settings.hub.outbound_queue,
        require_ws_auth = settings.server.require_ws_auth,
        "Hub ready"
    );

    let state = AppState::new(
        Arc::clone(&hub),
        users,
        chats,
        JwtAuth::new(&settings.auth.jwt_secret),
    )
    .with_ws_auth(settings.server.require_ws_auth);
    let app = build_router(Arc::new(state), settings.server.cors_origin.as_deref())?;

    let poller = if settings.poller.enabled {
        let source = quote_source(&settings)?;
        Some(QuotePoller::new(Arc::clone(&hub), source, settings.poller_config()).spawn())
    } else {
        tracing::info!("Quote poller disabled");
        None
    };

    let served = start_server(app, &settings.bind_addr(), shutdown_signal()).await;

    if let Some(poller) = poller {
        poller.shutdown().await;
    }
    served
}

fn quote_source(settings: &Settings) -> Result<Arc<dyn QuoteSource>> {
    match settings.poller.server_url.as_deref() {
        Some(url) => {
            tracing::info!(server_url = %url, "Fetching quotes over HTTP");
            let source = HttpQuoteSource::new(url, settings.poller.request_timeout())?;
            Ok(Arc::new(source))
        }
        None => Ok(Arc::new(SyntheticQuoteSource::new())),
    }
}

async fn connect_database(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    tickerchat_data::db::run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    Ok(pool)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
