//! Listen to an Adonis WebSocket server
//!
//! Connects, joins the configured topics on every open and logs events as
//! they arrive. Ctrl+C closes the session normally, then terminates it.

use adonis_client::adonis_ws::{self, ConnectionState, Lifecycle, Value};
use adonis_client::bin_common::{load_config_from_env, parse_args, ConfigType};
use adonis_client::config::ListenConfig;
use adonis_client::logging::init_tracing;
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

/// Time allowed for the close handshake before terminating
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load config first (before logging is initialized)
    let config_type = match parse_args().into_iter().next() {
        Some(path) => ConfigType::Custom(path),
        None => ConfigType::Listen,
    };
    let config_path = load_config_from_env(config_type);
    let config = ListenConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_tracing(&config.log_level);
    print_banner(&config);

    let mut builder = adonis_ws::builder()
        .url(config.url.as_str())
        .headers(config.headers.clone())
        .reconnect_strategy(config.reconnect.strategy());
    if let Some(reason) = &config.close_reason {
        builder = builder.close_reason(reason.as_str());
    }
    let connection = builder.build()?;

    let weak = connection.downgrade();
    let topics = config.topics.clone();
    connection
        .on_lifecycle(Lifecycle::Open, move |_: &str| {
            let Some(connection) = weak.upgrade() else {
                return;
            };
            for topic in &topics {
                if !connection.join(topic) {
                    warn!("Failed to join {}", topic);
                }
            }
        })
        .on_lifecycle(Lifecycle::Reconnecting, |_: &str| {
            warn!("Connection lost, reconnecting");
        })
        .set_state_listener(|state: ConnectionState| {
            info!("State: {}", state);
        });

    for topic in &config.topics {
        for event in &config.events {
            connection.on_event_response(
                topic.as_str(),
                event.as_str(),
                |topic: &str, event: &str, data: &Value| {
                    info!("[{}] {}: {}", topic, event, data);
                },
            );
        }
    }

    connection.connect();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl+C")?;
    info!("Shutdown requested");

    connection.close_normal();
    let deadline = tokio::time::Instant::now() + CLOSE_GRACE;
    while connection.state() != ConnectionState::Closed && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    connection.terminate();

    print_shutdown(&connection);
    Ok(())
}

fn print_banner(config: &ListenConfig) {
    info!("");
    info!("========================================");
    info!("Starting Adonis listener");
    info!("URL: {}", config.url);
    info!("Topics: {:?}", config.topics);
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}

fn print_shutdown(connection: &adonis_ws::Connection) {
    let metrics = connection.metrics();
    info!("");
    info!("========================================");
    info!("Adonis listener stopped gracefully");
    info!(
        "Sent {} frames, received {}, reconnected {} times",
        metrics.messages_sent, metrics.messages_received, metrics.reconnect_count
    );
    info!("========================================");
}
