//! Connection manager with a persistent subscription and automatic reconnection

use anyhow::{anyhow, Result};
use bytes::Bytes;
use robot_shared::state_machine::{LinkState, LinkStateMachine, LinkTrigger};
use robot_shared::{LinkEvent, SubscriberLink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};

/// Events emitted by the connection manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connected and the command subscription is in place
    Subscribed { topic: String },
    /// Connect attempt failed or the link dropped
    Disconnected { reason: String },
    /// A message arrived on the subscribed topic
    Received(InboundMessage),
    /// The manager stopped on request; no further events follow
    Shutdown,
}

/// A raw message as delivered by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Configuration for connection manager
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Topic to (re-)subscribe on every connect
    pub topic: String,
    /// Pause after a lost link before polling the link again
    pub reconnect_delay: Duration,
}

/// Requests the connection loop to stop
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// Manages the subscriber link and its subscription
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<LinkStateMachine>>,
    /// Channel to receive connection events
    event_rx: mpsc::Receiver<ConnectionEvent>,
    shutdown: ShutdownHandle,
}

impl ConnectionManager {
    /// Create a new connection manager and start the connection loop
    pub fn new<L: SubscriberLink>(link: L, config: ConnectionConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(100);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = Arc::new(RwLock::new(LinkStateMachine::new()));

        // Spawn the connection loop
        let config_clone = config.clone();
        let state_clone = state.clone();
        tokio::spawn(async move {
            connection_loop(link, config_clone, state_clone, event_tx, shutdown_rx).await;
        });

        Self {
            config,
            state,
            event_rx,
            shutdown: ShutdownHandle {
                tx: Arc::new(shutdown_tx),
            },
        }
    }

    /// Receive the next connection event
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.event_rx.recv().await
    }

    /// Current link state
    pub async fn state(&self) -> LinkState {
        self.state.read().await.state()
    }

    /// How many times the subscription has been issued
    pub async fn subscriptions_issued(&self) -> u64 {
        self.state.read().await.subscriptions_issued()
    }

    /// The topic this manager keeps subscribed
    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    /// Handle that can stop the loop from elsewhere (e.g. a signal handler)
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }
}

/// Main connection loop with reconnection logic
async fn connection_loop<L: SubscriberLink>(
    mut link: L,
    config: ConnectionConfig,
    state: Arc<RwLock<LinkStateMachine>>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        {
            let mut fsm = state.write().await;
            if fsm.state() == LinkState::Disconnected {
                fsm.process_event(LinkTrigger::ConnectStarted);
                info!("Connecting to broker via {}", link.name());
            }
        }

        let polled = tokio::select! {
            _ = shutdown_rx.changed() => break,
            polled = link.next_event() => polled,
        };

        let event = match polled {
            Ok(LinkEvent::Connected) => on_connected(&mut link, &config, &state).await,
            Ok(LinkEvent::Message { topic, payload }) => {
                Ok(ConnectionEvent::Received(InboundMessage { topic, payload }))
            }
            Err(e) => Err(anyhow!(e)),
        };

        match event {
            Ok(event) => {
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(reason) => {
                state.write().await.process_event(LinkTrigger::LinkLost);
                warn!("Broker link lost: {}", reason);

                let event = ConnectionEvent::Disconnected {
                    reason: reason.to_string(),
                };
                if event_tx.send(event).await.is_err() {
                    break;
                }

                // Wait before polling the link again
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(config.reconnect_delay) => {}
                }
            }
        }
    }

    if let Err(e) = link.disconnect().await {
        debug!("Disconnect on shutdown failed: {}", e);
    }
    state
        .write()
        .await
        .process_event(LinkTrigger::ShutdownRequested);
    info!("Connection manager stopped");
    let _ = event_tx.send(ConnectionEvent::Shutdown).await;
}

/// Re-issue the subscription after a (re-)connect
async fn on_connected<L: SubscriberLink>(
    link: &mut L,
    config: &ConnectionConfig,
    state: &RwLock<LinkStateMachine>,
) -> Result<ConnectionEvent> {
    link.subscribe(&config.topic).await?;
    state
        .write()
        .await
        .process_event(LinkTrigger::SubscriptionIssued);

    Ok(ConnectionEvent::Subscribed {
        topic: config.topic.clone(),
    })
}
