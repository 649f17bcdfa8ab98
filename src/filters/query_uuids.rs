//! Bulk name → UUID lookup through the merged identity space.

use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};

use crate::filters::{Filter, FilterError, MINECRAFT_SERVICES};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::matcher::{AnyMatcher, ExactRoute, Matcher};
use crate::yggdrasil::ProfileLookup;

/// Largest request body accepted for a name batch.
const MAX_BODY: usize = 64 * 1024;

pub struct UuidLookupFilter {
    lookup: Arc<dyn ProfileLookup>,
    routes: AnyMatcher,
}

impl UuidLookupFilter {
    pub fn new(lookup: Arc<dyn ProfileLookup>) -> Self {
        Self {
            lookup,
            routes: AnyMatcher::new(vec![
                Box::new(ExactRoute::new("api.mojang.com", "/profiles/minecraft")),
                Box::new(ExactRoute::new(MINECRAFT_SERVICES, "/minecraft/profile/lookup/bulk/byname")),
            ]),
        }
    }
}

#[async_trait]
impl Filter for UuidLookupFilter {
    fn name(&self) -> &'static str {
        "query_uuids"
    }

    fn matches(&self, domain: &str, path: &str) -> bool {
        self.routes.matches(domain, path)
    }

    async fn handle(
        &self,
        _domain: &str,
        _path: &str,
        request: &mut Request<'_>,
    ) -> Result<Option<Response>, FilterError> {
        if *request.method() != Method::POST {
            return Ok(None);
        }
        let body = request.body().read_to_end(MAX_BODY).await?;
        let names: Vec<String> = serde_json::from_slice(&body)
            .map_err(|e| FilterError::InvalidRequest(format!("expected a JSON array of names: {e}")))?;

        let found = self.lookup.query_uuids(&names).await?;
        let body = serde_json::to_vec(&found).map_err(|e| FilterError::Internal(e.to_string()))?;
        Ok(Some(Response::json(StatusCode::OK, body)))
    }
}
