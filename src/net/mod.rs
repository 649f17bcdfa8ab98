//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection (loopback only)
//!     → listener.rs (accept, connection limits)
//!     → connection.rs (id, lifecycle tracking)
//!     → Hand off to HTTP session
//! ```
//!
//! # Design Decisions
//! - The semaphore permit is held for the life of the connection task
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};
