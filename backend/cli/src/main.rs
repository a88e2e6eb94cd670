mod config;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use outdial_engine::{
    CallInitiator, CallbackRouter, DialConfig, ReaperConfig, RouterConfig, SessionReaper,
    SessionStore,
};
use outdial_gateway::{GatewayState, WebhookGuard, start_server};
use outdial_media::AudioStore;
use outdial_telephony::TwilioRest;
use outdial_tts::VoiceCloneClient;

use config::Config;

#[derive(Parser)]
#[command(name = "outdial")]
#[command(about = "Outdial — outbound call orchestration backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Outdial HTTP server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show current server status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    outdial_logging::init_logger(config.log_dir.as_deref().map(Path::new), &config.log_level);

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { port } => {
            let config = Config {
                port: port.unwrap_or(config.port),
                ..config
            };
            run_server(config).await?;
        }
        Commands::Status => {
            let client = reqwest::Client::new();
            match client
                .get(format!("http://localhost:{}/health", config.port))
                .send()
                .await
            {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(_) => {
                    println!("Outdial is not running on port {}", config.port);
                }
            }
        }
    }
    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    let (Some(account_sid), Some(auth_token), Some(from_number)) = (
        config.account_sid.clone(),
        config.auth_token.clone(),
        config.from_number.clone(),
    ) else {
        bail!(
            "telephony credentials missing: set TWILIO_ACCOUNT_SID, \
             TWILIO_AUTH_TOKEN and TWILIO_PHONE_NUMBER"
        );
    };

    let store = SessionStore::new();
    let provider = Arc::new(TwilioRest::new(account_sid, auth_token.clone()));

    let initiator = Arc::new(CallInitiator::new(
        provider,
        store.clone(),
        DialConfig {
            from_number,
            public_base_url: config.public_base_url.clone(),
        },
    ));

    let mut router_config = RouterConfig::new(&config.public_base_url);
    router_config.record_max_secs = config.record_max_secs;
    let router = Arc::new(CallbackRouter::new(store.clone(), router_config));

    let audio_store = AudioStore::new(
        &config.media_dir,
        format!("{}/media", config.public_base_url.trim_end_matches('/')),
    );
    audio_store.init().await.context("initializing media store")?;

    let synthesizer = Arc::new(VoiceCloneClient::new(&config.synthesis_url));

    // The only background task: fail idle sessions, evict expired ones.
    let reaper = SessionReaper::new(
        store.clone(),
        ReaperConfig {
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            inactivity_secs: config.call_timeout_secs,
            retention_secs: config.retention_secs,
        },
    );
    tokio::spawn(reaper.run());

    if !config.verify_signatures {
        warn!("Webhook signature verification is DISABLED — development only");
    }
    let webhook_guard = WebhookGuard {
        auth_token: config.verify_signatures.then_some(auth_token),
        public_base_url: config.public_base_url.clone(),
    };

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .context("invalid bind address")?;
    info!(public_base_url = %config.public_base_url, "Starting Outdial");

    start_server(
        addr,
        GatewayState {
            initiator,
            router,
            store,
            synthesizer,
            audio_store,
            webhook_guard,
        },
    )
    .await
}
