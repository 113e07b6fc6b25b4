mod config;
mod http;
mod publish;

use config::ServerConfig;
use http::AppState;
use publish::MqttPublisher;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ServerConfig::load()?;
    config.validate()?;

    info!("Web server starting");
    info!("  Broker: {}", config.mqtt.binding());
    info!("  Ack mode: {:?}", config.ack_mode);

    let publisher = Arc::new(MqttPublisher::new(&config.mqtt, config.publish_timeout()));
    let state = AppState::new(publisher, &config.mqtt.topic, config.ack_mode);
    let app = http::router(state).layer(TraceLayer::new_for_http());

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
