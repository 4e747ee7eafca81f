//! Resilient WebSocket connection
//!
//! - `state`: lifecycle state shared across threads
//! - `transport`: the event loop on the dedicated transport thread
//! - `manager`: the handle the orchestration loop drives
//! - `tls`: connector setup

mod manager;
mod state;
pub mod tls;
mod transport;

pub use manager::ConnectionManager;
pub use state::{ConnectionState, SharedState};
pub use transport::Outbox;
