//! Subscriber event loop: connection events in, actuator calls out

use crate::command::{CommandDispatcher, DispatchOutcome};
use crate::connection::{ConnectionEvent, ConnectionManager, InboundMessage};
use tracing::{debug, error, info, warn};

/// Drive the dispatcher from connection events until the manager shuts down.
///
/// Returns the dispatcher so the caller can halt the motors and report stats.
pub async fn run(
    mut conn: ConnectionManager,
    mut dispatcher: CommandDispatcher,
) -> CommandDispatcher {
    info!("Waiting for commands on {}", conn.topic());

    loop {
        match conn.recv().await {
            Some(ConnectionEvent::Subscribed { topic }) => {
                info!(
                    "Subscribed to {} (subscription #{})",
                    topic,
                    conn.subscriptions_issued().await
                );
            }
            Some(ConnectionEvent::Disconnected { reason }) => {
                warn!("Disconnected ({:?}): {}", conn.state().await, reason);
            }
            Some(ConnectionEvent::Received(message)) => {
                on_message(&mut dispatcher, &message);
            }
            Some(ConnectionEvent::Shutdown) => {
                info!("Connection manager shut down");
                break;
            }
            None => {
                error!("Connection manager closed");
                break;
            }
        }
    }

    dispatcher
}

fn on_message(dispatcher: &mut CommandDispatcher, message: &InboundMessage) {
    debug!(
        "{} {}",
        message.topic,
        String::from_utf8_lossy(&message.payload)
    );

    if let DispatchOutcome::Actuated(command) =
        dispatcher.dispatch(&message.topic, &message.payload)
    {
        debug!("Actuated {} -> {:?}", command, dispatcher.motion());
    }
}
