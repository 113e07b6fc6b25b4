//! Loopback MQTT broker (rumqttd) for tests that exercise the real client

use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, QoS};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

const BROKER_CONFIG: &str = r#"
id = 0

[router]
id = 0
max_connections = 100
max_outgoing_packet_count = 200
max_segment_size = 104857600
max_segment_count = 10

[v4.1]
name = "v4-1"
listen = "127.0.0.1:{port}"
next_connection_delay_ms = 1

[v4.1.connections]
connection_timeout_ms = 60000
max_payload_size = 20480
max_inflight_count = 100
dynamic_filters = true
"#;

/// Start a broker on `127.0.0.1:port` and wait until it accepts connections.
///
/// The broker thread lives until the test binary exits, so every test needs
/// its own port.
pub async fn start(port: u16) {
    let source = BROKER_CONFIG.replace("{port}", &port.to_string());
    let config: rumqttd::Config = config::Config::builder()
        .add_source(config::File::from_str(&source, config::FileFormat::Toml))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap();

    std::thread::spawn(move || {
        let mut broker = rumqttd::Broker::new(config);
        broker.start().unwrap();
    });

    timeout(Duration::from_secs(5), async {
        while TcpStream::connect(("127.0.0.1", port)).await.is_err() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("loopback broker did not start");
}

/// Connect as `client_id`, publish one QoS 0 message and disconnect
pub async fn publish_once(port: u16, client_id: &str, topic: &str, payload: &str) {
    let mut options = MqttOptions::new(client_id, "127.0.0.1", port);
    options.set_keep_alive(Duration::from_secs(5));

    let (client, mut eventloop) = AsyncClient::new(options, 10);
    client
        .publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
        .await
        .unwrap();
    client.disconnect().await.unwrap();

    timeout(Duration::from_secs(5), async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await
    .expect("publish did not complete");
}
