//! Transparent forwarding of unclaimed requests.
//!
//! # Responsibilities
//! - Replay method, headers and body against the resolved upstream URL
//! - Strip hop-by-hop headers in both directions
//! - Stream the upstream body back, fixed-length when upstream declared a
//!   `Content-Length`, chunked otherwise
//!
//! # Design Decisions
//! - Redirects are passed through to the client, never followed here
//! - No overall request timeout: bodies may stream for as long as they need
//! - The client body is pumped through a bounded channel while the upstream
//!   request is in flight, so neither side is buffered whole

use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use http::header::CONTENT_LENGTH;
use tokio::sync::mpsc;

use crate::http::codec::CodecError;
use crate::http::headers::{is_hop_by_hop, Headers};
use crate::http::request::Request;
use crate::http::response::Response;

const PUMP_BUFFER: usize = 16 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("upstream unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("invalid upstream target {0:?}")]
    InvalidTarget(String),
    /// Reading the client's body failed; the connection cannot be reused.
    #[error("client body: {0}")]
    ClientBody(#[from] CodecError),
}

#[derive(Debug, Clone)]
pub struct ReverseProxy {
    client: reqwest::Client,
}

impl ReverseProxy {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Client suited for forwarding: no redirects, no proxy, no total timeout.
    pub fn build_client(connect_timeout: Duration) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(connect_timeout)
            .no_proxy()
            .build()
    }

    /// Forward `request` to `target` and return the upstream response.
    pub async fn forward(&self, request: &mut Request<'_>, target: &str) -> Result<Response, ProxyError> {
        let url = url::Url::parse(target).map_err(|_| ProxyError::InvalidTarget(target.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProxyError::InvalidTarget(target.to_string()));
        }

        let mut builder = self.client.request(request.method().clone(), url);
        for (name, value) in request.headers().iter() {
            if !is_hop_by_hop(name) {
                builder = builder.header(name, value);
            }
        }

        let (tx, body_stream) = if request.has_body() {
            let (tx, mut rx) = mpsc::channel::<io::Result<Bytes>>(4);
            let body = stream::poll_fn(move |cx| rx.poll_recv(cx));
            (Some(tx), Some(body))
        } else {
            (None, None)
        };
        if let Some(body) = body_stream {
            builder = builder.body(reqwest::Body::wrap_stream(body));
        }

        let pump = async {
            let Some(tx) = tx else {
                return Ok::<_, CodecError>(());
            };
            let mut buf = vec![0u8; PUMP_BUFFER];
            loop {
                let n = request.body().read(&mut buf).await?;
                if n == 0 {
                    return Ok(());
                }
                if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                    // Upstream stopped reading; the session drains the rest.
                    return Ok(());
                }
            }
        };

        let (pumped, sent) = tokio::join!(pump, builder.send());
        pumped?;
        let upstream = sent.map_err(ProxyError::Unreachable)?;

        let status = upstream.status();
        let length = upstream
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let headers: Headers = upstream
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        tracing::debug!(
            status = status.as_u16(),
            content_length = ?length,
            "Upstream responded"
        );

        let body = upstream.bytes_stream().map_err(io::Error::other).boxed();
        Ok(Response::streaming(status, body, length).with_headers(headers))
    }
}
