//! Connection lifecycle state shared between the transport thread and the
//! orchestration thread

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of the streaming connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Open = 2,
    Failed = 3,
    /// Transient while `close()` runs
    Closing = 4,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Failed,
            4 => Self::Closing,
            _ => Self::Disconnected,
        }
    }

    /// Whether `self -> to` is a legal lifecycle edge
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Disconnected | Self::Failed, Self::Connecting)
                | (Self::Connecting, Self::Open | Self::Failed)
                | (Self::Open, Self::Disconnected | Self::Failed)
                | (Self::Open | Self::Connecting | Self::Failed, Self::Closing)
                | (Self::Closing, Self::Disconnected)
        )
    }

    /// Lowercase name for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Failed => "failed",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single atomically-updated state value
///
/// Cloning shares the same underlying value.
#[derive(Debug, Clone)]
pub struct SharedState(Arc<AtomicU8>);

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    /// Start in `Disconnected`
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ConnectionState::Disconnected as u8)))
    }

    /// Current state
    #[must_use]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Whether the connection is open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.get() == ConnectionState::Open
    }

    /// Move to `to` if that is a legal edge from the current state
    ///
    /// Returns `true` if the state is `to` afterwards. Illegal edges leave the
    /// state untouched.
    pub fn transition(&self, to: ConnectionState) -> bool {
        let mut current = self.get();
        loop {
            if current == to {
                return true;
            }
            if !current.can_transition(to) {
                tracing::trace!(from = %current, to = %to, "ignoring illegal state transition");
                return false;
            }
            match self.0.compare_exchange(
                current as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    tracing::debug!(from = %current, to = %to, "connection state changed");
                    return true;
                }
                Err(actual) => current = ConnectionState::from_u8(actual),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionState::{Closing, Connecting, Disconnected, Failed, Open};
    use super::*;

    #[test]
    fn starts_disconnected() {
        assert_eq!(SharedState::new().get(), Disconnected);
    }

    #[test]
    fn happy_path() {
        let state = SharedState::new();
        assert!(state.transition(Connecting));
        assert!(state.transition(Open));
        assert!(state.is_open());
        assert!(state.transition(Closing));
        assert!(state.transition(Disconnected));
    }

    #[test]
    fn failed_is_a_retry_origin() {
        let state = SharedState::new();
        state.transition(Connecting);
        assert!(state.transition(Failed));
        assert!(state.transition(Connecting));
    }

    #[test]
    fn illegal_edges_are_rejected() {
        let state = SharedState::new();
        assert!(!state.transition(Open));
        assert_eq!(state.get(), Disconnected);

        state.transition(Connecting);
        assert!(!state.transition(Disconnected));
        assert_eq!(state.get(), Connecting);

        state.transition(Failed);
        assert!(!state.transition(Open));
        assert_eq!(state.get(), Failed);
    }

    #[test]
    fn closing_blocks_late_open() {
        let state = SharedState::new();
        state.transition(Connecting);
        state.transition(Closing);
        assert!(!state.transition(Open));
        assert!(state.transition(Disconnected));
    }

    #[test]
    fn same_state_is_a_noop() {
        let state = SharedState::new();
        assert!(state.transition(Disconnected));
        state.transition(Connecting);
        assert!(state.transition(Connecting));
    }

    #[test]
    fn clones_share_the_value() {
        let state = SharedState::new();
        let observer = state.clone();
        state.transition(Connecting);
        assert_eq!(observer.get(), Connecting);

        let handle = std::thread::spawn(move || observer.transition(Open));
        assert!(handle.join().unwrap());
        assert!(state.is_open());
    }
}
