//! Labhook - GitLab webhook receiver
//!
//! Accepts GitLab webhook deliveries on a single path, verifies the shared
//! token and logs every accepted event.

use clap::{Parser, Subcommand};
use labhook_api::WebhookServer;
use labhook_core::{config::LabhookConfig, Event, WebhookDispatcher};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "labhook")]
#[command(author = "Labhook Team")]
#[command(version = labhook_core::VERSION)]
#[command(about = "GitLab webhook receiver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true, env = "LABHOOK_CONFIG")]
    config: Option<String>,

    /// Bind address
    #[arg(long, env = "LABHOOK_BIND_ADDRESS")]
    bind: Option<String>,

    /// Port number
    #[arg(short, long, env = "LABHOOK_PORT")]
    port: Option<u16>,

    /// Webhook path
    #[arg(long, env = "LABHOOK_PATH")]
    path: Option<String>,

    /// Shared secret expected in X-Gitlab-Token
    #[arg(long, env = "LABHOOK_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LABHOOK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long, env = "LABHOOK_LOG_FORMAT")]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server
    Serve,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load or create config
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = LabhookConfig::from_file(path)?;
            config.apply_env();
            config
        }
        None => LabhookConfig::from_env(),
    };

    // Override with CLI args
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(path) = cli.path {
        config.webhook.path = path;
    }
    if let Some(secret) = cli.secret {
        config.webhook.secret = secret;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    init_logging(&config);

    match cli.command {
        Some(Commands::Version) => {
            println!("labhook {}", labhook_core::VERSION);
        }
        Some(Commands::Serve) | None => {
            run_server(config).await?;
        }
    }

    Ok(())
}

fn init_logging(config: &LabhookConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

async fn run_server(config: LabhookConfig) -> anyhow::Result<()> {
    info!("Starting Labhook {}...", labhook_core::VERSION);

    let dispatcher = WebhookDispatcher::new(config.webhook.clone());

    dispatcher.on(labhook_core::WILDCARD_CHANNEL, |event| {
        if let Event::Any {
            event_name,
            repository,
            payload,
        } = event
        {
            info!(
                event = event_name.unwrap_or("-"),
                repository = repository.unwrap_or("-"),
                object_kind = payload
                    .get("object_kind")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("-"),
                "Received GitLab event"
            );
        }
        Ok(())
    });

    dispatcher.on(labhook_core::ERROR_CHANNEL, |event| {
        if let Event::Error { error, request, .. } = event {
            warn!(
                reason = %error,
                code = error.code(),
                event = %request.header_lossy(labhook_core::EVENT_HEADER).unwrap_or_default(),
                "Rejected GitLab webhook"
            );
        }
        Ok(())
    });

    let server = WebhookServer::new(config, dispatcher);
    server.run().await?;

    Ok(())
}
