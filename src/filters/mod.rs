//! Request filters: routes the gateway answers itself.
//!
//! # Data Flow
//! ```text
//! (domain, path, request)
//!     → Filter::matches (domain + path only)
//!     → Filter::handle  (method and parameters checked here; None = decline)
//!     → Response, or fall through to the reverse proxy
//! ```
//!
//! # Design Decisions
//! - Chain order is fixed at startup by `build_chain`
//! - Canned filters never touch the network
//! - Lookup filters go through a `ProfileLookup`, so tests can swap in fakes

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;

use crate::config::GatewayConfig;
use crate::http::codec::CodecError;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::observability::GatewayMetrics;
use crate::yggdrasil::{ProfileLookup, YggdrasilError};

pub mod anti_features;
pub mod debug;
pub mod legacy_skin;
pub mod profile_key;
pub mod public_keys;
pub mod query_profile;
pub mod query_uuids;

pub use anti_features::AntiFeaturesFilter;
pub use debug::DebugMetricsFilter;
pub use legacy_skin::LegacySkinFilter;
pub use profile_key::ProfileKeyFilter;
pub use public_keys::PublicKeysFilter;
pub use query_profile::ProfileLookupFilter;
pub use query_uuids::UuidLookupFilter;

pub const MINECRAFT_SERVICES: &str = "api.minecraftservices.com";

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error(transparent)]
    Upstream(#[from] YggdrasilError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Reading the request body failed; the connection must be dropped.
    #[error("request body: {0}")]
    Body(#[from] CodecError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl FilterError {
    /// Status sent to the client. `None` means no response can be sent.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FilterError::Upstream(YggdrasilError::Protocol(_)) => Some(StatusCode::INTERNAL_SERVER_ERROR),
            FilterError::Upstream(_) => Some(StatusCode::BAD_GATEWAY),
            FilterError::InvalidRequest(_) => Some(StatusCode::BAD_REQUEST),
            FilterError::Body(CodecError::BodyTooLarge(_)) => Some(StatusCode::PAYLOAD_TOO_LARGE),
            FilterError::Body(_) => None,
            FilterError::Internal(_) => Some(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

/// A route the gateway may answer locally.
#[async_trait]
pub trait Filter: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this filter claims `domain` + `path`.
    fn matches(&self, domain: &str, path: &str) -> bool;

    /// Answer the request, or decline with `Ok(None)`.
    async fn handle(
        &self,
        domain: &str,
        path: &str,
        request: &mut Request<'_>,
    ) -> Result<Option<Response>, FilterError>;
}

/// Shared collaborators the filters are built from.
pub struct FilterContext {
    /// Merged identity space used by the lookup filters.
    pub lookup: Arc<dyn ProfileLookup>,
    /// Custom provider alone, for lookups that must not be merged.
    pub custom: Arc<dyn ProfileLookup>,
    /// Client for fetching textures.
    pub http: reqwest::Client,
    pub metrics: Arc<GatewayMetrics>,
}

/// Filters in dispatch order, honouring the feature flags.
pub fn build_chain(config: &GatewayConfig, context: FilterContext) -> Vec<Arc<dyn Filter>> {
    let features = &config.features;
    let mut chain: Vec<Arc<dyn Filter>> = Vec::new();
    if features.legacy_skin_polyfill {
        chain.push(Arc::new(LegacySkinFilter::new(context.custom.clone(), context.http.clone())));
    }
    if features.mojang_anti_features {
        chain.push(Arc::new(AntiFeaturesFilter::new()));
    }
    if features.profile_key {
        chain.push(Arc::new(ProfileKeyFilter::new()));
    }
    chain.push(Arc::new(PublicKeysFilter::new(&config.upstream.signature_public_keys)));
    chain.push(Arc::new(UuidLookupFilter::new(context.lookup.clone())));
    chain.push(Arc::new(ProfileLookupFilter::new(context.lookup)));
    if features.debug_api {
        chain.push(Arc::new(DebugMetricsFilter::new(context.metrics)));
    }
    chain
}
