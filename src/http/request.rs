//! Request parsing and body access.
//!
//! # Responsibilities
//! - Parse the request line and header section of one HTTP/1.x message
//! - Pick the body framing (`Transfer-Encoding: chunked` or `Content-Length`)
//! - Expose the body as a lazily read stream, sending `100 Continue` on the
//!   first read when the client asked for it
//!
//! # Design Decisions
//! - A message carrying both `Transfer-Encoding` and `Content-Length` is
//!   rejected outright instead of guessing which one the client meant
//! - The request borrows the connection for its lifetime, so the body can
//!   only be read while the exchange is in progress

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::http::codec::{ChunkedReader, CodecError, FixedLengthReader};
use crate::http::headers::Headers;
use crate::http::session::SessionError;

/// A bidirectional byte stream a request can be read from.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + ?Sized> Transport for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

/// Body framing chosen from the request headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    None,
    Fixed(u64),
    Chunked,
}

/// Decoded query string, keeping the order parameters first appeared in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: Vec<(String, Vec<String>)>,
}

impl QueryParams {
    pub fn parse(raw: &str) -> Self {
        let mut query = QueryParams::default();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            query.push(key.into_owned(), value.into_owned());
        }
        query
    }

    fn push(&mut self, key: String, value: String) {
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.params.push((key, vec![value])),
        }
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Everything about a request except its body.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub path: String,
    pub raw_query: Option<String>,
    pub query: QueryParams,
    pub version: Version,
    pub headers: Headers,
    pub framing: BodyFraming,
}

impl RequestHead {
    /// Parse a complete header section (request line through the blank line).
    pub fn parse(raw: &[u8]) -> Result<Self, SessionError> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| SessionError::BadRequest("request head is not valid UTF-8"))?;
        let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

        let request_line = lines
            .next()
            .ok_or(SessionError::BadRequest("missing request line"))?;
        let mut parts = request_line.split(' ');
        let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(t), Some(v), None) if !m.is_empty() && !t.is_empty() => (m, t, v),
            _ => return Err(SessionError::BadRequest("malformed request line")),
        };

        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| SessionError::BadRequest("invalid method"))?;
        let version = match version {
            "HTTP/1.1" => Version::Http11,
            "HTTP/1.0" => Version::Http10,
            _ => return Err(SessionError::BadRequest("unsupported protocol version")),
        };
        let (path, raw_query) = split_target(target)?;

        let mut headers = Headers::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            if line.starts_with(&[' ', '\t'][..]) {
                return Err(SessionError::BadRequest("obsolete header folding"));
            }
            let (name, value) = line
                .split_once(':')
                .ok_or(SessionError::BadRequest("header line without colon"))?;
            if name.is_empty() || !name.bytes().all(is_token_byte) {
                return Err(SessionError::BadRequest("invalid header name"));
            }
            headers.append(name, value.trim_matches(&[' ', '\t'][..]));
        }

        let framing = body_framing(&headers)?;
        let query = raw_query.as_deref().map(QueryParams::parse).unwrap_or_default();

        Ok(Self {
            method,
            path,
            raw_query,
            query,
            version,
            headers,
            framing,
        })
    }

    /// HTTP/1.1 without `Connection: close`.
    pub fn keep_alive(&self) -> bool {
        self.version == Version::Http11 && !self.headers.has_token("connection", "close")
    }

    pub fn expects_continue(&self) -> bool {
        self.version == Version::Http11
            && self
                .headers
                .get("expect")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("100-continue"))
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn split_target(target: &str) -> Result<(String, Option<String>), SessionError> {
    if target.starts_with('/') {
        return Ok(match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        });
    }
    // absolute-form, as sent to proxies
    let url = url::Url::parse(target).map_err(|_| SessionError::BadRequest("invalid request target"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SessionError::BadRequest("invalid request target"));
    }
    Ok((url.path().to_string(), url.query().map(str::to_string)))
}

fn body_framing(headers: &Headers) -> Result<BodyFraming, SessionError> {
    let chunked = match headers.get_all("transfer-encoding").last() {
        None => false,
        Some(value) => {
            let last = value.rsplit(',').next().unwrap_or("").trim();
            if !last.eq_ignore_ascii_case("chunked") {
                return Err(SessionError::BadRequest("unsupported transfer coding"));
            }
            true
        }
    };

    let mut length: Option<u64> = None;
    for value in headers.get_all("content-length").flat_map(|v| v.split(',')) {
        let value = value.trim();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SessionError::BadRequest("invalid content-length"));
        }
        let parsed: u64 = value
            .parse()
            .map_err(|_| SessionError::BadRequest("invalid content-length"))?;
        if length.is_some_and(|l| l != parsed) {
            return Err(SessionError::BadRequest("conflicting content-length values"));
        }
        length = Some(parsed);
    }

    match (chunked, length) {
        (true, Some(_)) => Err(SessionError::BadRequest(
            "both transfer-encoding and content-length present",
        )),
        (true, None) => Ok(BodyFraming::Chunked),
        (false, Some(n)) => Ok(BodyFraming::Fixed(n)),
        (false, None) => Ok(BodyFraming::None),
    }
}

enum BodyReader<'a> {
    Empty,
    Buffered(Bytes),
    Fixed(FixedLengthReader<&'a mut (dyn Transport + 'a)>),
    Chunked(ChunkedReader<&'a mut (dyn Transport + 'a)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContinueState {
    NotRequested,
    Pending,
    Sent,
}

/// Request body, read on demand from the connection.
pub struct RequestBody<'a> {
    reader: BodyReader<'a>,
    continue_state: ContinueState,
    read_timeout: Option<Duration>,
}

impl<'a> RequestBody<'a> {
    pub fn empty() -> Self {
        Self {
            reader: BodyReader::Empty,
            continue_state: ContinueState::NotRequested,
            read_timeout: None,
        }
    }

    /// A body that is already in memory.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Self::empty();
        }
        Self {
            reader: BodyReader::Buffered(bytes),
            continue_state: ContinueState::NotRequested,
            read_timeout: None,
        }
    }

    pub(crate) fn from_transport(
        io: &'a mut (dyn Transport + 'a),
        framing: BodyFraming,
        expect_continue: bool,
        read_timeout: Duration,
    ) -> Self {
        let reader = match framing {
            BodyFraming::None | BodyFraming::Fixed(0) => BodyReader::Empty,
            BodyFraming::Fixed(n) => BodyReader::Fixed(FixedLengthReader::new(io, n)),
            BodyFraming::Chunked => BodyReader::Chunked(ChunkedReader::new(io)),
        };
        let continue_state = if expect_continue && !matches!(reader, BodyReader::Empty) {
            ContinueState::Pending
        } else {
            ContinueState::NotRequested
        };
        Self {
            reader,
            continue_state,
            read_timeout: Some(read_timeout),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.reader, BodyReader::Empty)
    }

    /// Declared length, if the body is not chunked.
    pub fn content_length(&self) -> Option<u64> {
        match &self.reader {
            BodyReader::Empty => Some(0),
            BodyReader::Buffered(b) => Some(b.len() as u64),
            BodyReader::Fixed(r) => Some(r.remaining()),
            BodyReader::Chunked(_) => None,
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, CodecError> {
        if let BodyReader::Buffered(bytes) = &mut self.reader {
            let n = buf.len().min(bytes.len());
            buf[..n].copy_from_slice(&bytes.split_to(n));
            return Ok(n);
        }
        if self.is_empty() {
            return Ok(0);
        }
        self.send_continue().await?;
        let read_timeout = self.read_timeout;
        let read = async {
            match &mut self.reader {
                BodyReader::Fixed(r) => r.read(buf).await,
                BodyReader::Chunked(r) => r.read(buf).await,
                BodyReader::Empty | BodyReader::Buffered(_) => Ok(0),
            }
        };
        with_timeout(read_timeout, read).await
    }

    /// Read the whole body, failing once it grows past `limit` bytes.
    pub async fn read_to_end(&mut self, limit: usize) -> Result<Bytes, CodecError> {
        if let BodyReader::Buffered(bytes) = &mut self.reader {
            if bytes.len() > limit {
                return Err(CodecError::BodyTooLarge(limit));
            }
            return Ok(std::mem::take(bytes));
        }
        let mut out = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out.into());
            }
            if out.len() + n > limit {
                return Err(CodecError::BodyTooLarge(limit));
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Discard whatever the handler did not read.
    ///
    /// Returns false when the client is still waiting for `100 Continue`; the
    /// body was never sent and the connection cannot be reused safely.
    pub async fn drain(&mut self) -> Result<bool, CodecError> {
        if self.continue_state == ContinueState::Pending {
            return Ok(false);
        }
        let read_timeout = self.read_timeout;
        let drain = async {
            match &mut self.reader {
                BodyReader::Fixed(r) => r.drain().await.map(|_| ()),
                BodyReader::Chunked(r) => r.drain().await.map(|_| ()),
                BodyReader::Buffered(b) => {
                    b.clear();
                    Ok(())
                }
                BodyReader::Empty => Ok(()),
            }
        };
        with_timeout(read_timeout, drain).await?;
        Ok(true)
    }

    async fn send_continue(&mut self) -> Result<(), CodecError> {
        if self.continue_state != ContinueState::Pending {
            return Ok(());
        }
        let io: &mut (dyn Transport + 'a) = match &mut self.reader {
            BodyReader::Fixed(r) => &mut **r.get_mut(),
            BodyReader::Chunked(r) => &mut **r.get_mut(),
            BodyReader::Empty | BodyReader::Buffered(_) => return Ok(()),
        };
        io.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
        io.flush().await?;
        self.continue_state = ContinueState::Sent;
        Ok(())
    }
}

async fn with_timeout<T>(
    limit: Option<Duration>,
    fut: impl std::future::Future<Output = Result<T, CodecError>>,
) -> Result<T, CodecError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            CodecError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "timed out reading request body",
            ))
        })?,
        None => fut.await,
    }
}

/// One parsed request. Immutable except for its body stream.
pub struct Request<'a> {
    head: RequestHead,
    body: RequestBody<'a>,
    peer: Option<SocketAddr>,
}

impl<'a> Request<'a> {
    pub fn new(head: RequestHead, body: RequestBody<'a>) -> Self {
        Self {
            head,
            body,
            peer: None,
        }
    }

    pub(crate) fn with_peer(mut self, peer: Option<SocketAddr>) -> Self {
        self.peer = peer;
        self
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn path(&self) -> &str {
        &self.head.path
    }

    pub fn raw_query(&self) -> Option<&str> {
        self.head.raw_query.as_deref()
    }

    pub fn query(&self) -> &QueryParams {
        &self.head.query
    }

    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn body(&mut self) -> &mut RequestBody<'a> {
        &mut self.body
    }

    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }
}

impl std::fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.head.method)
            .field("path", &self.head.path)
            .field("query", &self.head.raw_query)
            .field("peer", &self.peer)
            .finish()
    }
}
