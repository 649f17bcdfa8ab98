//! Identity subsystem.
//!
//! # Data Flow
//! ```text
//! lookup filter
//!     → merger.rs (split by suffix / provenance bit)
//!     → client.rs (custom provider)   client.rs (global provider)
//!     → merger.rs (mask + re-suffix global results)
//!     → profile.rs (JSON wire form)
//! ```

pub mod client;
pub mod merger;
pub mod namespace;
pub mod profile;

pub use client::{ApiProvider, ProfileLookup, YggdrasilClient, YggdrasilError};
pub use merger::NamespaceMerger;
pub use profile::{GameProfile, ProfileRef, PropertyValue};
