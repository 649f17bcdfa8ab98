//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming local path (/<scheme>/<domain><path>)
//!     → matcher.rs (recover the original target)
//!     → router.rs (first filter whose route matches)
//!     → Return: Answered, Declined or Unclaimed
//! ```
//!
//! # Design Decisions
//! - Filter chain built at startup, immutable at runtime
//! - No regex in hot path (exact and segment matching only)
//! - Deterministic: same input always matches same filter
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use matcher::LocalTarget;
pub use router::{Dispatch, FilterChain};
