//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Keep the listener on loopback
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// One problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.listener.bind_address.parse::<SocketAddr>() {
        Ok(addr) if !addr.ip().is_loopback() => errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{addr} is not a loopback address"),
        )),
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new("listener.bind_address", e.to_string())),
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    if config.listener.read_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.read_timeout_secs", "must be greater than 0"));
    }
    if config.listener.max_header_bytes < 256 {
        errors.push(ValidationError::new("listener.max_header_bytes", "must be at least 256"));
    }

    if config.upstream.api_root.trim().is_empty() {
        errors.push(ValidationError::new("upstream.api_root", "is required"));
    } else {
        match config.upstream.api_root_url() {
            Ok(url) if !matches!(url.scheme(), "http" | "https") => errors.push(ValidationError::new(
                "upstream.api_root",
                format!("unsupported scheme {:?}", url.scheme()),
            )),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new("upstream.api_root", e.to_string())),
        }
    }
    if let Some(proxy) = &config.upstream.mojang_proxy {
        if let Err(e) = url::Url::parse(proxy) {
            errors.push(ValidationError::new("upstream.mojang_proxy", e.to_string()));
        }
    }
    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.connect_timeout_secs", "must be greater than 0"));
    }
    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.request_timeout_secs", "must be greater than 0"));
    }

    if !matches!(config.observability.log_format.as_str(), "pretty" | "compact" | "full") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format {:?}", config.observability.log_format),
        ));
    }
    if let Some(addr) = &config.observability.metrics_address {
        if let Err(e) = addr.parse::<SocketAddr>() {
            errors.push(ValidationError::new("observability.metrics_address", e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_config_passes() {
        let config = GatewayConfig::with_api_root("https://auth.example.com/api/yggdrasil");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn missing_api_root_is_reported() {
        let errors = validate_config(&GatewayConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "upstream.api_root");
    }

    #[test]
    fn reports_every_problem() {
        let mut config = GatewayConfig::with_api_root("ftp://example.com/");
        config.listener.bind_address = "0.0.0.0:8080".into();
        config.listener.max_connections = 0;
        config.observability.log_format = "json".into();
        let fields: Vec<_> = validate_config(&config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            [
                "listener.bind_address",
                "listener.max_connections",
                "upstream.api_root",
                "observability.log_format"
            ]
        );
    }
}
