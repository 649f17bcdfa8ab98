//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Loopback listener settings.
    pub listener: ListenerConfig,

    /// Identity provider and forwarding settings.
    pub upstream: UpstreamConfig,

    /// Optional behaviours of the filter chain.
    pub features: FeatureFlags,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Parse a TOML document without validating it.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Configuration pointing at `api_root` with every other value defaulted.
    pub fn with_api_root(api_root: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.upstream.api_root = api_root.into();
        config
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address; must be a loopback address. Port 0 picks a free port.
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Per-read timeout on client sockets.
    pub read_timeout_secs: u64,

    /// Upper bound on the request line plus headers.
    pub max_header_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_string(),
            max_connections: 256,
            read_timeout_secs: 30,
            max_header_bytes: 8192,
        }
    }
}

impl ListenerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Root URL of the custom Yggdrasil API.
    pub api_root: String,

    /// HTTP proxy used to reach the global provider.
    pub mojang_proxy: Option<String>,

    /// Connect timeout for every upstream connection.
    pub connect_timeout_secs: u64,

    /// Total timeout for identity lookups.
    pub request_timeout_secs: u64,

    /// Public keys advertised by the public-key endpoint (PEM or bare base64).
    pub signature_public_keys: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_root: String::new(),
            mojang_proxy: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            signature_public_keys: Vec::new(),
        }
    }
}

impl UpstreamConfig {
    /// The API root as a URL that always ends in `/`.
    pub fn api_root_url(&self) -> Result<Url, url::ParseError> {
        let trimmed = self.api_root.trim();
        if trimmed.ends_with('/') {
            Url::parse(trimmed)
        } else {
            Url::parse(&format!("{trimmed}/"))
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Feature switches. Everything is on unless turned off.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Merge the global provider's namespace (`@mojang` names, masked UUIDs).
    pub mojang_namespace: bool,

    /// Serve `skins.minecraft.net/MinecraftSkins/<name>.png`.
    pub legacy_skin_polyfill: bool,

    /// Answer privilege and blocklist queries locally.
    pub mojang_anti_features: bool,

    /// Issue throwaway profile key pairs.
    pub profile_key: bool,

    /// Expose `/debug/metrics`.
    pub debug_api: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            mojang_namespace: true,
            legacy_skin_polyfill: true,
            mojang_anti_features: true,
            profile_key: true,
            debug_api: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or `EnvFilter` directive (overridden by `RUST_LOG`).
    pub log_level: String,

    /// `pretty`, `compact` or `full`.
    pub log_format: String,

    /// Prometheus exporter bind address; no exporter when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_address: None,
        }
    }
}
