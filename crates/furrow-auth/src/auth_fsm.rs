//! Session state machine using rust-fsm.
//!
//! The session starts `Uninitialized` and settles into `Authenticated` or
//! `Anonymous` once an auth call resolves or the identity provider reports
//! who is signed in. After that it only moves between the two settled states.
//!
//! ## State Diagram
//!
//! ```text
//!                ┌─────────────────┐
//!                │  Uninitialized  │ (initial, loading)
//!                └────────┬────────┘
//!        SignedIn /       │        SignedOut /
//!        UserNotified     │        AnonymousNotified
//!          ┌──────────────┴──────────────┐
//!          ▼                             ▼
//! ┌─────────────────┐  SignedOut   ┌─────────────────┐
//! │  Authenticated  │ ───────────► │    Anonymous    │
//! │                 │ ◄─────────── │                 │
//! └─────────────────┘  SignedIn    └─────────────────┘
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Uninitialized)

    Uninitialized => {
        SignedIn => Authenticated,
        SignedOut => Anonymous,
        UserNotified => Authenticated,
        AnonymousNotified => Anonymous
    },
    Authenticated => {
        SignedIn => Authenticated,
        SignedOut => Anonymous,
        UserNotified => Authenticated,
        AnonymousNotified => Anonymous
    },
    Anonymous => {
        SignedIn => Authenticated,
        SignedOut => Anonymous,
        UserNotified => Authenticated,
        AnonymousNotified => Anonymous
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session phase for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No resolved call or provider notification yet.
    Uninitialized,
    /// A user is signed in.
    Authenticated,
    /// Nobody is signed in.
    Anonymous,
}

impl SessionPhase {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionPhase::Authenticated)
    }

    /// True once the first resolved call or notification has been applied.
    pub fn is_settled(&self) -> bool {
        !matches!(self, SessionPhase::Uninitialized)
    }
}

impl From<&SessionMachineState> for SessionPhase {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Uninitialized => SessionPhase::Uninitialized,
            SessionMachineState::Authenticated => SessionPhase::Authenticated,
            SessionMachineState::Anonymous => SessionPhase::Anonymous,
        }
    }
}

/// Configuration for retry behavior during token refresh.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum number of attempts.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    /// Exponential delay for a 0-indexed attempt, capped at `max_delay_ms`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let delay_ms = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}
