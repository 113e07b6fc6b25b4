//! Subscriber Link State Machine
//!
//! Tracks the subscriber's broker link:
//! ```text
//! Disconnected -> Connecting -> Subscribed -> (link lost) -> Disconnected -> ...
//! ```
//! `Shutdown` is terminal and only reached on explicit request.

/// State of the subscriber's broker link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Subscribed,
    Shutdown,
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTrigger {
    /// A connection attempt has started
    ConnectStarted,
    /// Broker accepted the connection and the subscription was issued
    SubscriptionIssued,
    /// Connect attempt failed or an established link dropped
    LinkLost,
    /// Explicit shutdown
    ShutdownRequested,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid; holds the new state
    Success(LinkState),
    /// Transition was invalid from current state
    Invalid { from: LinkState, event: LinkTrigger },
}

/// The link state machine plus the counters the reconnect logic reports
#[derive(Debug, Default)]
pub struct LinkStateMachine {
    current_state: LinkState,
    subscriptions_issued: u64,
    links_lost: u64,
}

impl LinkStateMachine {
    /// Create a new state machine in Disconnected state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current state
    pub fn state(&self) -> LinkState {
        self.current_state
    }

    /// Number of times the subscription has been (re-)issued
    pub fn subscriptions_issued(&self) -> u64 {
        self.subscriptions_issued
    }

    /// Number of failed connects and dropped links seen so far
    pub fn links_lost(&self) -> u64 {
        self.links_lost
    }

    /// Whether the machine has reached its terminal state
    pub fn is_shutdown(&self) -> bool {
        self.current_state == LinkState::Shutdown
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: LinkTrigger) -> TransitionResult {
        match self.get_next_state(event) {
            Some(state) => {
                match event {
                    LinkTrigger::SubscriptionIssued => self.subscriptions_issued += 1,
                    LinkTrigger::LinkLost => self.links_lost += 1,
                    _ => {}
                }
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    /// Get the next state for a given event, if the transition is valid
    fn get_next_state(&self, event: LinkTrigger) -> Option<LinkState> {
        use LinkState::*;
        use LinkTrigger::*;

        match (self.current_state, event) {
            // Nothing leaves Shutdown
            (Shutdown, _) => None,
            (_, ShutdownRequested) => Some(Shutdown),

            (Disconnected, ConnectStarted) => Some(Connecting),

            // Re-subscribing on an already subscribed link is idempotent
            (Connecting | Subscribed, SubscriptionIssued) => Some(Subscribed),

            (Connecting | Subscribed | Disconnected, LinkLost) => Some(Disconnected),

            // Invalid transition
            _ => None,
        }
    }
}
