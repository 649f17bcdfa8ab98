//! `GET /debug/metrics` on the gateway's own domain.

use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};

use crate::filters::{Filter, FilterError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::observability::GatewayMetrics;
use crate::routing::matcher::{ExactRoute, Matcher};

/// Pseudo-domain for the gateway's own endpoints.
pub const GATEWAY_DOMAIN: &str = "yggdrasil-gateway";

const ROUTE: ExactRoute = ExactRoute::new(GATEWAY_DOMAIN, "/debug/metrics");

pub struct DebugMetricsFilter {
    metrics: Arc<GatewayMetrics>,
}

impl DebugMetricsFilter {
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl Filter for DebugMetricsFilter {
    fn name(&self) -> &'static str {
        "debug_metrics"
    }

    fn matches(&self, domain: &str, path: &str) -> bool {
        ROUTE.matches(domain, path)
    }

    async fn handle(
        &self,
        _domain: &str,
        _path: &str,
        request: &mut Request<'_>,
    ) -> Result<Option<Response>, FilterError> {
        if *request.method() != Method::GET {
            return Ok(None);
        }
        let body = serde_json::to_vec(&self.metrics.snapshot()).map_err(|e| FilterError::Internal(e.to_string()))?;
        Ok(Some(Response::json(StatusCode::OK, body)))
    }
}
