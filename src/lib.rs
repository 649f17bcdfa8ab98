//! Loopback gateway for the Yggdrasil authentication protocol.
//!
//! # Architecture Overview
//!
//! ```text
//!     launcher / game client
//!         │  http://127.0.0.1:<port>/<scheme>/<domain><path>
//!         ▼
//!   ┌─────────┐    ┌─────────┐    ┌──────────────┐
//!   │   net   │───▶│  http   │───▶│   routing    │
//!   │listener │    │ session │    │ filter chain │
//!   └─────────┘    └─────────┘    └──────┬───────┘
//!                                        │
//!                    answered ◀──────────┤ declined / unclaimed
//!                                        ▼
//!                                 ┌──────────────┐
//!                                 │    proxy     │──▶ API root or original host
//!                                 └──────────────┘
//!
//!   filters ──▶ yggdrasil (custom provider + masked global namespace)
//! ```

pub mod config;
pub mod filters;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod yggdrasil;

pub use config::GatewayConfig;
pub use http::Gateway;
pub use lifecycle::Shutdown;
