//! Connection state machine for the progress client.
//!
//! All retry bookkeeping lives here; the driver in [`crate::client`] only
//! performs the [`Action`] each transition asks for. Timers are the
//! driver's business, so the table below can be tested without one.
//!
//! ```text
//! Disconnected --Start/TimerFired--> Connecting        (Open)
//! Connecting   --Opened-----------> Connected          (Listen, retries = 0)
//! Connecting   --Dropped----------> Disconnected       (Wait) | Exhausted (GiveUp)
//! Connected    --Dropped----------> Disconnected       (Wait) | Exhausted (GiveUp)
//! Exhausted    --*----------------> Exhausted          (GiveUp)
//! ```

use std::time::Duration;

use crate::backoff::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Retry budget spent. Terminal.
    Exhausted,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Inputs to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Start,
    Opened,
    /// The open failed, or an open stream errored or closed.
    Dropped,
    /// The scheduled reconnect delay elapsed.
    TimerFired,
}

/// What the driver must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Open,
    Listen,
    Wait(Duration),
    GiveUp,
    /// The event does not apply in the current state.
    Ignore,
}

pub struct ReconnectMachine {
    policy: RetryPolicy,
    state: ConnectionState,
    retry_count: u32,
    jitter: Box<dyn FnMut() -> Duration + Send + Sync>,
}

impl ReconnectMachine {
    /// A machine drawing random jitter from `policy`.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_jitter(policy, move || policy.jitter())
    }

    pub fn with_jitter(
        policy: RetryPolicy,
        jitter: impl FnMut() -> Duration + Send + Sync + 'static,
    ) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            retry_count: 0,
            jitter: Box::new(jitter),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnects scheduled since the last successful open.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn on_event(&mut self, event: ConnectionEvent) -> Action {
        use ConnectionEvent as E;
        use ConnectionState as S;

        let (next, action) = match (self.state, event) {
            (S::Exhausted, _) => (S::Exhausted, Action::GiveUp),
            (S::Disconnected, E::Start | E::TimerFired) => (S::Connecting, Action::Open),
            (S::Connecting, E::Opened) => {
                self.retry_count = 0;
                (S::Connected, Action::Listen)
            }
            (S::Connecting | S::Connected, E::Dropped) => {
                if self.retry_count < self.policy.max_retries {
                    let delay = self.policy.delay_for(self.retry_count, (self.jitter)());
                    self.retry_count += 1;
                    (S::Disconnected, Action::Wait(delay))
                } else {
                    (S::Exhausted, Action::GiveUp)
                }
            }
            (state, _) => (state, Action::Ignore),
        };

        if next != self.state {
            tracing::debug!(
                from = self.state.as_str(),
                to = next.as_str(),
                retry_count = self.retry_count,
                "Progress client state changed",
            );
        }
        self.state = next;
        action
    }
}
