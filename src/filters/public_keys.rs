//! `GET /publickeys`: the keys that sign profile properties.

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::Serialize;

use crate::filters::{Filter, FilterError, MINECRAFT_SERVICES};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::matcher::{ExactRoute, Matcher};

const ROUTE: ExactRoute = ExactRoute::new(MINECRAFT_SERVICES, "/publickeys");

#[derive(Serialize)]
struct PublicKeyEntry {
    #[serde(rename = "publicKey")]
    public_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeysBody<'a> {
    profile_property_keys: &'a [PublicKeyEntry],
    player_certificate_keys: &'a [PublicKeyEntry],
}

#[derive(Debug)]
pub struct PublicKeysFilter {
    body: String,
}

/// Bare base64 of a PEM or base64 key: armour lines and whitespace removed.
pub fn strip_armor(key: &str) -> String {
    key.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .flat_map(|line| line.chars().filter(|c| !c.is_whitespace()))
        .collect()
}

impl PublicKeysFilter {
    pub fn new(keys: &[String]) -> Self {
        let entries: Vec<_> = keys
            .iter()
            .map(|k| PublicKeyEntry {
                public_key: strip_armor(k),
            })
            .filter(|e| !e.public_key.is_empty())
            .collect();
        let body = PublicKeysBody {
            profile_property_keys: &entries,
            player_certificate_keys: &entries,
        };
        // Serialising owned strings into a string cannot fail.
        let body = serde_json::to_string(&body).unwrap_or_default();
        Self { body }
    }
}

#[async_trait]
impl Filter for PublicKeysFilter {
    fn name(&self) -> &'static str {
        "public_keys"
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
        Ok(Some(Response::json(StatusCode::OK, self.body.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::{RequestBody, RequestHead};

    #[test]
    fn strips_pem_armour() {
        let pem = "-----BEGIN PUBLIC KEY-----\nMIIB\r\nIjAN \n-----END PUBLIC KEY-----\n";
        assert_eq!(strip_armor(pem), "MIIBIjAN");
        assert_eq!(strip_armor("  MIIBIjAN "), "MIIBIjAN");
    }

    #[tokio::test]
    async fn lists_configured_keys_twice() {
        let filter = PublicKeysFilter::new(&[
            "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----".to_string(),
            "BBBB".to_string(),
        ]);
        let head = RequestHead::parse(b"GET /publickeys HTTP/1.1\r\n\r\n").unwrap();
        let mut request = Request::new(head, RequestBody::empty());
        let response = filter
            .handle(MINECRAFT_SERVICES, "/publickeys", &mut request)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            response.into_bytes().await.unwrap(),
            r#"{"profilePropertyKeys":[{"publicKey":"AAAA"},{"publicKey":"BBBB"}],"playerCertificateKeys":[{"publicKey":"AAAA"},{"publicKey":"BBBB"}]}"#
                .as_bytes()
        );
    }

    #[test]
    fn no_keys_gives_empty_lists() {
        assert_eq!(
            PublicKeysFilter::new(&[]).body,
            r#"{"profilePropertyKeys":[],"playerCertificateKeys":[]}"#
        );
    }
}
