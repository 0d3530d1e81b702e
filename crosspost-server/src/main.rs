//! crosspost-server - store a post once, publish it everywhere

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use crosspost_server::{build_app, shutdown, AppState};
use libcrosspost::logging::{LogFormat, LoggingConfig};
use libcrosspost::Config;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "crosspost-server")]
#[command(version)]
#[command(about = "Store a post and republish it to Mastodon, Twitter and Threads")]
#[command(long_about = "\
crosspost-server - store a post once, publish it everywhere

DESCRIPTION:
    Accepts a short text post over HTTP, writes it to the configured store,
    then publishes it to Mastodon, Twitter and Threads in that order. The
    first failure ends the request; nothing is retried or rolled back.

ENDPOINTS:
    POST /api/postToAll   {\"text\": \"...\"} or {\"Body\": \"...\"}
    POST /api/post        alias of /api/postToAll
    GET  /api/rss         RSS 2.0 feed of the 10 most recent posts
    GET  /health          which stages have credentials configured

CONFIGURATION:
    Configuration file: ~/.config/crosspost/config.toml (or CROSSPOST_CONFIG)
    Credentials are read from the environment or a .env file:
        SUPABASE_URL, SUPABASE_KEY
        MASTODON_API_URL, MASTODON_ACCESS_TOKEN
        TWITTER_CONSUMER_KEY, TWITTER_CONSUMER_SECRET,
        TWITTER_ACCESS_TOKEN, TWITTER_ACCESS_TOKEN_SECRET
        THREADS_USERNAME, THREADS_PASSWORD

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes in-flight requests)
")]
struct Cli {
    /// Path to the config file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config)
    #[arg(short, long, value_name = "ADDR", env = "CROSSPOST_BIND")]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Use an in-memory store and fake platforms
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.verbose = cli.verbose;
    logging.init().map_err(anyhow::Error::msg)?;

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let config = load_config(cli.config.as_deref())?;

    let state = if cli.dry_run {
        warn!("Dry run: posts are kept in memory and no platform is contacted");
        AppState::dry_run(&config)
    } else {
        for (stage, vars) in config.missing_credentials() {
            warn!(
                "{} is not configured (missing {}); every publish request will fail at this stage",
                stage,
                vars.join(", ")
            );
        }
        AppState::from_config(&config)
            .await
            .context("Failed to initialize store and publishers")?
    };

    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind))?;

    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("crosspost-server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal())
        .await
        .context("Server error")?;

    info!("crosspost-server stopped");
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let mut config = Config::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env();
            config.validate()?;
            config
        }
        None => Config::load().context("Failed to load configuration")?,
    };
    Ok(config)
}
