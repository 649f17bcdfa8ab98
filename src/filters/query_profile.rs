//! UUID → profile lookup through the merged identity space.

use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};

use crate::filters::{Filter, FilterError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::matcher::{Matcher, SegmentRoute};
use crate::yggdrasil::profile::parse_unsigned_uuid;
use crate::yggdrasil::ProfileLookup;

const ROUTE: SegmentRoute = SegmentRoute::new("sessionserver.mojang.com", "/session/minecraft/profile/", "");

pub struct ProfileLookupFilter {
    lookup: Arc<dyn ProfileLookup>,
}

impl ProfileLookupFilter {
    pub fn new(lookup: Arc<dyn ProfileLookup>) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl Filter for ProfileLookupFilter {
    fn name(&self) -> &'static str {
        "query_profile"
    }

    fn matches(&self, domain: &str, path: &str) -> bool {
        ROUTE.matches(domain, path)
    }

    async fn handle(
        &self,
        _domain: &str,
        path: &str,
        request: &mut Request<'_>,
    ) -> Result<Option<Response>, FilterError> {
        if *request.method() != Method::GET {
            return Ok(None);
        }
        let Some(id) = ROUTE.capture(path).and_then(parse_unsigned_uuid) else {
            return Ok(None);
        };
        let with_signature = request.query().get("unsigned") == Some("false");

        match self.lookup.query_profile(id, with_signature).await? {
            Some(profile) => {
                let body = serde_json::to_vec(&profile).map_err(|e| FilterError::Internal(e.to_string()))?;
                Ok(Some(Response::json(StatusCode::OK, body)))
            }
            None => Ok(Some(Response::new(StatusCode::NO_CONTENT))),
        }
    }
}
