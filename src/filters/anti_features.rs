//! Local answers for privilege and blocklist queries.

use async_trait::async_trait;
use http::{Method, StatusCode};

use crate::filters::{Filter, FilterError, MINECRAFT_SERVICES};
use crate::http::request::Request;
use crate::http::response::Response;

pub const PRIVILEGES: &str = r#"{"privileges":{"onlineChat":{"enabled":true},"multiplayerServer":{"enabled":true},"multiplayerRealms":{"enabled":true},"telemetry":{"enabled":false}}}"#;

pub const PLAYER_ATTRIBUTES: &str = r#"{"privileges":{"onlineChat":{"enabled":true},"multiplayerServer":{"enabled":true},"multiplayerRealms":{"enabled":true},"telemetry":{"enabled":false},"optionalTelemetry":{"enabled":false}},"profanityFilterPreferences":{"profanityFilterOn":false},"banStatus":{"bannedScopes":{}}}"#;

pub const BLOCKLIST: &str = r#"{"blockedProfiles":[]}"#;

const ROUTES: [(&str, &str); 3] = [
    ("/privileges", PRIVILEGES),
    ("/player/attributes", PLAYER_ATTRIBUTES),
    ("/privacy/blocklist", BLOCKLIST),
];

#[derive(Debug, Default)]
pub struct AntiFeaturesFilter;

impl AntiFeaturesFilter {
    pub fn new() -> Self {
        Self
    }

    fn payload(path: &str) -> Option<&'static str> {
        ROUTES.iter().find(|(p, _)| *p == path).map(|(_, body)| *body)
    }
}

#[async_trait]
impl Filter for AntiFeaturesFilter {
    fn name(&self) -> &'static str {
        "anti_features"
    }

    fn matches(&self, domain: &str, path: &str) -> bool {
        domain.eq_ignore_ascii_case(MINECRAFT_SERVICES) && Self::payload(path).is_some()
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
        Ok(Self::payload(path).map(|body| Response::json(StatusCode::OK, body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::{RequestBody, RequestHead};

    fn request(method: &str, path: &str) -> Request<'static> {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Request::new(RequestHead::parse(raw.as_bytes()).unwrap(), RequestBody::empty())
    }

    #[tokio::test]
    async fn canned_payloads_are_byte_identical() {
        let filter = AntiFeaturesFilter::new();
        for (path, expected) in ROUTES {
            assert!(filter.matches(MINECRAFT_SERVICES, path));
            let mut req = request("GET", path);
            let response = filter
                .handle(MINECRAFT_SERVICES, path, &mut req)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.content_type(), Some("application/json; charset=utf-8"));
            assert_eq!(response.into_bytes().await.unwrap(), expected.as_bytes());
        }
    }

    #[tokio::test]
    async fn other_methods_decline() {
        let filter = AntiFeaturesFilter::new();
        let mut req = request("POST", "/privileges");
        assert!(filter
            .handle(MINECRAFT_SERVICES, "/privileges", &mut req)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn only_services_domain_matches() {
        let filter = AntiFeaturesFilter::new();
        assert!(!filter.matches("api.mojang.com", "/privileges"));
        assert!(!filter.matches(MINECRAFT_SERVICES, "/player/certificates"));
    }

    #[test]
    fn payloads_are_valid_json() {
        for (_, body) in ROUTES {
            serde_json::from_str::<serde_json::Value>(body).unwrap();
        }
    }
}
