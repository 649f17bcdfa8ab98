//! Reverse proxy subsystem.
//!
//! # Data Flow
//! ```text
//! unclaimed request (scheme, domain, path, query)
//!     → redirector.rs (upstream base for known domains)
//!     → forward.rs (replay upstream, stream the answer back)
//! ```

pub mod forward;
pub mod redirector;

pub use forward::{ProxyError, ReverseProxy};
pub use redirector::{ApiRootRedirector, Redirector};
