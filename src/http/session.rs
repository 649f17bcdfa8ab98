//! One HTTP/1.1 connection: read a request, hand it to a handler, write the
//! response, repeat while the connection is kept alive.
//!
//! # Responsibilities
//! - Read the header section with a size bound and a read timeout
//! - Reject malformed requests with 400 (or 431 for oversized heads)
//! - Drain unread body bytes so the next request starts on a clean boundary
//! - Decide keep-alive from the protocol version and `Connection` headers
//!
//! # Design Decisions
//! - Strictly one exchange at a time; pipelined requests wait in the socket
//!   buffer until the previous response has been written
//! - Framing errors abort the connection: once a body cannot be delimited
//!   there is no reliable place to start the next message

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use http::{Method, StatusCode};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::http::codec::CodecError;
use crate::http::request::{Request, RequestBody, RequestHead, Transport};
use crate::http::response::{write_response, Response, WriteOptions};

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("bad request: {0}")]
    BadRequest(&'static str),

    #[error("request header section exceeds {0} bytes")]
    HeadersTooLarge(usize),

    #[error("body framing error: {0}")]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for the client")]
    Timeout,
}

/// Produces a response for one request.
///
/// Returning `Ok(None)` closes the connection without a response. Returning
/// an error aborts the connection.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: &mut Request<'_>) -> Result<Option<Response>, CodecError>;
}

/// Per-session limits.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub read_timeout: Duration,
    pub max_header_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            max_header_bytes: 8192,
        }
    }
}

enum Outcome {
    /// Client closed or idled out before sending a request.
    Idle,
    /// Handler chose not to answer.
    Unanswered,
    Answered { keep_alive: bool },
}

/// A client connection speaking HTTP/1.x.
pub struct HttpSession<S> {
    io: BufReader<S>,
    peer: Option<SocketAddr>,
    config: SessionConfig,
}

impl<S> HttpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, peer: Option<SocketAddr>, config: SessionConfig) -> Self {
        Self {
            io: BufReader::new(stream),
            peer,
            config,
        }
    }

    /// Serve requests until the connection closes. Returns the number of
    /// responses written.
    pub async fn run<H: Handler + ?Sized>(mut self, handler: &H) -> Result<u64, SessionError> {
        let mut served = 0u64;
        let result = loop {
            match self.exchange(handler).await {
                Ok(Outcome::Answered { keep_alive }) => {
                    served += 1;
                    if !keep_alive {
                        break Ok(served);
                    }
                }
                Ok(Outcome::Idle | Outcome::Unanswered) => break Ok(served),
                Err(e) => break Err(e),
            }
        };
        let _ = self.io.get_mut().shutdown().await;
        result
    }

    async fn exchange<H: Handler + ?Sized>(&mut self, handler: &H) -> Result<Outcome, SessionError> {
        let raw_head = match self.read_head().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(Outcome::Idle),
            Err(SessionError::HeadersTooLarge(limit)) => {
                self.reject(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE).await;
                return Err(SessionError::HeadersTooLarge(limit));
            }
            Err(e) => return Err(e),
        };
        let head = match RequestHead::parse(&raw_head) {
            Ok(head) => head,
            Err(e) => {
                self.reject(StatusCode::BAD_REQUEST).await;
                return Err(e);
            }
        };

        let keep_alive = head.keep_alive();
        let head_only = head.method == Method::HEAD;
        let framing = head.framing;
        let expect_continue = head.expects_continue();

        let io: &mut (dyn Transport + '_) = &mut self.io;
        let body = RequestBody::from_transport(io, framing, expect_continue, self.config.read_timeout);
        let mut request = Request::new(head, body).with_peer(self.peer);

        let response = handler.handle(&mut request).await?;
        let reusable = request.body().drain().await?;
        drop(request);

        let Some(response) = response else {
            return Ok(Outcome::Unanswered);
        };
        let keep_alive = keep_alive && reusable && !response.wants_close();
        write_response(
            &mut self.io,
            response,
            WriteOptions {
                keep_alive,
                head_only,
            },
        )
        .await?;
        Ok(Outcome::Answered { keep_alive })
    }

    /// Read up to and including the blank line ending the header section.
    /// `Ok(None)` means the client closed (or idled out) between requests.
    async fn read_head(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        let limit = self.config.max_header_bytes;
        let mut head = Vec::with_capacity(512);
        loop {
            let line_start = head.len();
            let budget = (limit + 2).saturating_sub(line_start) as u64;
            let mut limited = (&mut self.io).take(budget);
            let read = limited.read_until(b'\n', &mut head);
            let n = match tokio::time::timeout(self.config.read_timeout, read).await {
                Ok(result) => result?,
                Err(_) if head.is_empty() => return Ok(None),
                Err(_) => return Err(SessionError::Timeout),
            };

            if n == 0 {
                if head.is_empty() {
                    return Ok(None);
                }
                return Err(SessionError::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            if !head.ends_with(b"\n") {
                if n as u64 >= budget {
                    return Err(SessionError::HeadersTooLarge(limit));
                }
                return Err(SessionError::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }

            let line = &head[line_start..];
            if line == b"\r\n" || line == b"\n" {
                if line_start == 0 {
                    // stray CRLF between requests
                    head.clear();
                    continue;
                }
                return Ok(Some(head));
            }
            if head.len() > limit {
                return Err(SessionError::HeadersTooLarge(limit));
            }
        }
    }

    async fn reject(&mut self, status: StatusCode) {
        let options = WriteOptions {
            keep_alive: false,
            head_only: false,
        };
        if let Err(e) = write_response(&mut self.io, Response::new(status), options).await {
            tracing::debug!(peer = ?self.peer, error = %e, "Failed to send rejection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::Body;
    use tokio::io::duplex;

    /// Echoes the request body back, with the path in a header.
    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, request: &mut Request<'_>) -> Result<Option<Response>, CodecError> {
            if request.path() == "/drop" {
                return Ok(None);
            }
            if request.path() == "/ignore-body" {
                return Ok(Some(Response::fixed(StatusCode::OK, Some("text/plain"), "ignored")));
            }
            let path = request.path().to_string();
            let body = request.body().read_to_end(1 << 20).await?;
            Ok(Some(
                Response::fixed(StatusCode::OK, Some("text/plain"), body).with_header("X-Path", path),
            ))
        }
    }

    async fn converse(input: &[u8]) -> (String, Result<u64, SessionError>) {
        let (mut client, server) = duplex(64 * 1024);
        let session = HttpSession::new(server, None, SessionConfig::default());
        let task = tokio::spawn(async move { session.run(&Echo).await });
        client.write_all(input).await.unwrap();
        client.shutdown().await.unwrap();
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        (String::from_utf8(out).unwrap(), task.await.unwrap())
    }

    #[tokio::test]
    async fn serves_keep_alive_requests_in_order() {
        let (out, result) = converse(
            b"POST /one HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello\
              POST /two HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
        )
        .await;
        assert_eq!(result.unwrap(), 2);
        let first = out.find("X-Path: /one").unwrap();
        let second = out.find("X-Path: /two").unwrap();
        assert!(first < second);
        assert!(out.contains("\r\n\r\nhello"));
        assert!(out.contains("\r\n\r\nWikipedia"));
    }

    #[tokio::test]
    async fn unread_body_is_drained_before_next_request() {
        let (out, result) = converse(
            b"POST /ignore-body HTTP/1.1\r\nContent-Length: 10\r\n\r\n0123456789\
              GET /after HTTP/1.1\r\n\r\n",
        )
        .await;
        assert_eq!(result.unwrap(), 2);
        assert!(out.contains("X-Path: /after"));
    }

    #[tokio::test]
    async fn conflicting_framing_is_rejected_with_400() {
        let (out, result) = converse(
            b"POST /x HTTP/1.1\r\nContent-Length: 3\r\nTransfer-Encoding: chunked\r\n\r\nabc",
        )
        .await;
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(out.contains("Connection: close\r\n"));
        assert!(matches!(result, Err(SessionError::BadRequest(_))));
    }

    #[tokio::test]
    async fn oversized_head_is_rejected_with_431() {
        let mut input = b"GET / HTTP/1.1\r\nX-Big: ".to_vec();
        input.extend(std::iter::repeat(b'a').take(10_000));
        input.extend_from_slice(b"\r\n\r\n");
        let (out, result) = converse(&input).await;
        assert!(out.starts_with("HTTP/1.1 431"));
        assert!(matches!(result, Err(SessionError::HeadersTooLarge(8192))));
    }

    #[tokio::test]
    async fn connection_close_ends_session() {
        let (out, result) = converse(
            b"GET /a HTTP/1.1\r\nConnection: close\r\n\r\nGET /b HTTP/1.1\r\n\r\n",
        )
        .await;
        assert_eq!(result.unwrap(), 1);
        assert!(out.contains("X-Path: /a"));
        assert!(!out.contains("X-Path: /b"));
        assert!(out.contains("Connection: close\r\n"));
    }

    #[tokio::test]
    async fn http10_closes_after_response() {
        let (out, result) = converse(b"GET /a HTTP/1.0\r\n\r\nGET /b HTTP/1.0\r\n\r\n").await;
        assert!(result.is_ok());
        assert!(!out.contains("X-Path: /b"));
    }

    #[tokio::test]
    async fn truncated_chunked_body_aborts_without_response() {
        let (out, result) = converse(
            b"POST /x HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\na\r\n123456789a\r",
        )
        .await;
        assert!(out.is_empty());
        assert!(matches!(result, Err(SessionError::Codec(CodecError::TruncatedBody))));
    }

    #[tokio::test]
    async fn handler_without_response_closes_connection() {
        let (out, result) = converse(b"GET /drop HTTP/1.1\r\n\r\nGET /never HTTP/1.1\r\n\r\n").await;
        assert!(out.is_empty());
        assert_eq!(result.unwrap(), 0);
    }

    #[tokio::test]
    async fn continue_is_sent_lazily_once() {
        let (mut client, server) = duplex(64 * 1024);
        let session = HttpSession::new(server, None, SessionConfig::default());
        let task = tokio::spawn(async move { session.run(&Echo).await });

        client
            .write_all(b"POST /c HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 4\r\n\r\n")
            .await
            .unwrap();
        let mut interim = [0u8; 25];
        client.read_exact(&mut interim).await.unwrap();
        assert_eq!(&interim, b"HTTP/1.1 100 Continue\r\n\r\n");

        client.write_all(b"ping").await.unwrap();
        client.shutdown().await.unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        let rest = String::from_utf8(rest).unwrap();
        assert!(rest.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(!rest.contains("100 Continue"));
        assert!(rest.ends_with("ping"));
        assert_eq!(task.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn continue_not_sent_when_body_is_ignored() {
        let (out, result) = converse(
            b"POST /ignore-body HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 4\r\n\r\n",
        )
        .await;
        assert!(!out.contains("100 Continue"));
        assert!(out.contains("Connection: close\r\n"));
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn idle_client_is_dropped_after_timeout() {
        let (mut client, server) = duplex(1024);
        let config = SessionConfig {
            read_timeout: Duration::from_millis(50),
            ..SessionConfig::default()
        };
        let session = HttpSession::new(server, None, config);
        let task = tokio::spawn(async move { session.run(&Echo).await });
        client.write_all(b"GET /slow HTTP/1.1\r\nX-Partial").await.unwrap();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(SessionError::Timeout)));
    }

    #[test]
    fn body_debug_is_compact() {
        assert_eq!(format!("{:?}", Body::Empty), "Empty");
    }
}
