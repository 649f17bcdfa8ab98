//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! loopback TCP connection
//!     → session.rs (read head, frame body, keep-alive loop)
//!     → request.rs (parse head, query, lazy body)
//!     → server.rs (filter chain or reverse proxy)
//!     → response.rs (fixed or chunked framing)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - HTTP/1.1 only; the gateway is a local endpoint for one client
//! - Request bodies are read on demand so proxied uploads stream through
//! - `100 Continue` is sent only when a handler starts reading the body

pub mod codec;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;
pub mod session;

pub use headers::Headers;
pub use request::{Request, RequestBody, RequestHead};
pub use response::Response;
pub use server::{Gateway, GatewayError, GatewayService};
pub use session::{Handler, HttpSession, SessionConfig, SessionError};
