mod actuator;
mod bridge;
mod command;
mod config;
mod connection;
mod transport;

use command::CommandDispatcher;
use config::BridgeConfig;
use connection::{ConnectionManager, ShutdownHandle};
use transport::MqttLink;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = BridgeConfig::load()?;
    config.validate()?;

    info!("Robot starting");
    info!("  Broker: {}", config.mqtt.binding());
    info!("  Client: {}", config.mqtt.client_id);

    let actuator = actuator::from_config(&config)?;
    let dispatcher = CommandDispatcher::new(actuator, config.mqtt.topic.clone());

    let link = MqttLink::new(&config.mqtt);
    let conn = ConnectionManager::new(link, config.connection());

    spawn_signal_handler(conn.shutdown_handle());

    let mut dispatcher = bridge::run(conn, dispatcher).await;

    if let Err(e) = dispatcher.halt() {
        error!("Failed to halt motors: {:#}", e);
    }
    let stats = dispatcher.stats();
    info!("Robot stopped after {} messages: {}", stats.total(), stats);

    Ok(())
}

/// Ctrl-C is the only way out; it stops the connection loop cleanly
fn spawn_signal_handler(shutdown: ShutdownHandle) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                shutdown.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}
