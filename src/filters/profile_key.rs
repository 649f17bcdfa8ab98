//! Throwaway profile key pairs for `POST /player/certificates`.
//!
//! Clients refuse to chat without a profile key. The account service has
//! no use for it, so a fresh RSA key pair is issued on every call with a
//! dummy signature. Clients load the keys as PKCS#8 and X.509 SPKI RSA keys.

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use http::{Method, StatusCode};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;

use crate::filters::{Filter, FilterError, MINECRAFT_SERVICES};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::matcher::{ExactRoute, Matcher};

const ROUTE: ExactRoute = ExactRoute::new(MINECRAFT_SERVICES, "/player/certificates");
const DUMMY_SIGNATURE: &str = "AA==";
const MIME_LINE: usize = 76;
const KEY_BITS: usize = 2048;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyPairBody {
    private_key: String,
    public_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CertificateBody {
    key_pair: KeyPairBody,
    public_key_signature: &'static str,
    public_key_signature_v2: &'static str,
    expires_at: String,
    refreshed_after: String,
}

#[derive(Debug, Default)]
pub struct ProfileKeyFilter;

impl ProfileKeyFilter {
    pub fn new() -> Self {
        Self
    }
}

/// Base64 in 76-character lines separated by CRLF.
pub fn mime_base64(data: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    encoded
        .as_bytes()
        .chunks(MIME_LINE)
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect::<Vec<_>>()
        .join("\r\n")
}

fn armor(kind: &str, der: &[u8]) -> String {
    format!(
        "-----BEGIN RSA {kind} KEY-----\n{}\n-----END RSA {kind} KEY-----\n",
        mime_base64(der)
    )
}

/// DER of a fresh RSA key pair: PKCS#8 private key, X.509 SPKI public key.
fn generate_key_pair() -> Result<(Vec<u8>, Vec<u8>), FilterError> {
    let internal = |e: &dyn std::fmt::Display| FilterError::Internal(e.to_string());
    let private = RsaPrivateKey::new(&mut rand::thread_rng(), KEY_BITS).map_err(|e| internal(&e))?;
    let private_der = private.to_pkcs8_der().map_err(|e| internal(&e))?;
    let public_der = RsaPublicKey::from(&private)
        .to_public_key_der()
        .map_err(|e| internal(&e))?;
    Ok((private_der.as_bytes().to_vec(), public_der.as_bytes().to_vec()))
}

fn certificate_body(now: DateTime<Utc>, private_der: &[u8], public_der: &[u8]) -> Result<String, FilterError> {
    let body = CertificateBody {
        key_pair: KeyPairBody {
            private_key: armor("PRIVATE", private_der),
            public_key: armor("PUBLIC", public_der),
        },
        public_key_signature: DUMMY_SIGNATURE,
        public_key_signature_v2: DUMMY_SIGNATURE,
        expires_at: (now + Duration::hours(48)).to_rfc3339_opts(SecondsFormat::Millis, true),
        refreshed_after: (now + Duration::hours(36)).to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    serde_json::to_string(&body).map_err(|e| FilterError::Internal(e.to_string()))
}

#[async_trait]
impl Filter for ProfileKeyFilter {
    fn name(&self) -> &'static str {
        "profile_key"
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
        if *request.method() != Method::POST {
            return Ok(None);
        }
        // Key generation is CPU bound; keep it off the reactor.
        let (private_der, public_der) = tokio::task::spawn_blocking(generate_key_pair)
            .await
            .map_err(|e| FilterError::Internal(e.to_string()))??;
        let body = certificate_body(Utc::now(), &private_der, &public_der)?;
        Ok(Some(Response::json(StatusCode::OK, body)))
    }
}
