use clap::Parser;
use log::info;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use ble_wifi_gateway::config::{self, Config};
use ble_wifi_gateway::protocol::SERVICE_UUID;
use ble_wifi_gateway::relay;
use ble_wifi_gateway::service::GatewayService;

/// Wi-Fi provisioning and network inspection over a BLE control channel.
#[derive(Parser, Debug)]
#[command(name = "ble-wifi-gateway", version, about)]
struct Cli {
    /// Unix socket the BLE peripheral shim connects to
    #[arg(long, env = "GATEWAY_SOCKET_PATH")]
    socket: Option<String>,

    /// Negotiated per-message payload ceiling in bytes
    #[arg(long, env = "GATEWAY_PAYLOAD_CEILING")]
    payload_ceiling: Option<usize>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    config::load_dotenv();
    init_logger();
    info!("Starting BLE Wi-Fi gateway");

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(socket) = cli.socket {
        config.transport.socket_path = socket;
    }
    if let Some(ceiling) = cli.payload_ceiling {
        config.transport.payload_ceiling = ceiling;
    }

    info!("Configuration loaded:");
    info!("  Service UUID: {SERVICE_UUID}");
    info!("  Socket: {}", config.transport.socket_path);
    info!("  Chunk size: {} bytes", config.transport.chunk_size());
    info!("  Query TTL: {} ms", config.cache.query_ttl_ms);

    let service = Arc::new(GatewayService::new(&config));

    if let Err(err) = service.provider().ensure_extraction_adapter().await {
        log::warn!("Health check failed ({err}); structured queries will report it per request");
    }

    let shutdown = CancellationToken::new();
    let relay_task = {
        let service = service.clone();
        let shutdown = shutdown.clone();
        let socket_path = config.transport.socket_path.clone();
        tokio::spawn(async move {
            if let Err(err) = relay::run(service, &socket_path, shutdown).await {
                log::error!("Relay error: {err}");
            }
        })
    };

    info!("BLE Wi-Fi gateway is running");
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => log::error!("Failed to listen for shutdown signal: {e}"),
    }

    shutdown.cancel();
    if let Err(err) = relay_task.await {
        log::error!("Relay task panicked: {err}");
    }

    info!("BLE Wi-Fi gateway stopped");
}
