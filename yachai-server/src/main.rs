use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};
use yachai_core::{TelegramClient, YachaiConfig};

use yachai_server::http::{self, HttpState};
use yachai_server::subsystems::listener::{self, ListenerContext};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "yachai.toml")]
    config: String,

    /// Check the report store and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience: production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match YachaiConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let state = match HttpState::from_config(config).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Failed to start Yachai: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match state.store.health().await {
            Ok(v) => println!("✅ Report store ({}): {}", state.store.name(), v),
            Err(e) => {
                println!("❌ Report store check failed: {}", e);
                std::process::exit(1);
            }
        }
        if state.classifier.is_some() {
            println!("✅ Gemini API key configured");
        } else {
            println!("⚠️  Gemini API key missing; submissions will be refused");
        }
        println!("✅ Yachai health check passed");
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Telegram listener for bot submissions
    let telegram = &state.config.telegram;
    if telegram.listener_enabled {
        let client = TelegramClient::new(
            &telegram.bot_token,
            Duration::from_secs(telegram.timeout_seconds + telegram.poll_timeout_seconds),
        )?;
        if client.is_configured() {
            let ctx = ListenerContext {
                client,
                store: state.store.clone(),
                classifier: state.classifier.clone(),
                max_input_length: state.config.submission.max_input_length,
                poll_timeout: Duration::from_secs(telegram.poll_timeout_seconds),
            };
            tokio::spawn(listener::run_listener(ctx, tx.subscribe()));
        } else {
            tracing::warn!("Telegram listener enabled but bot token is not configured; skipping");
        }
    }

    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
