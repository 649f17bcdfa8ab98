//! Response representation and serialization.
//!
//! # Responsibilities
//! - Carry status, content type, headers and a body source
//! - Choose the framing: a known length is sent with `Content-Length`,
//!   anything else with `Transfer-Encoding: chunked`
//! - Write the response head and stream the body onto the connection
//!
//! # Design Decisions
//! - Framing headers (`Content-Length`, `Transfer-Encoding`, `Connection`)
//!   are owned by the writer; copies in the header map are ignored
//! - 1xx, 204 and 304 responses never carry a body or framing headers
//! - A streamed body that disagrees with its declared length aborts the
//!   connection instead of sending a corrupt message

use std::io;

use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use http::StatusCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::codec::{ChunkedWriter, CodecError};
use crate::http::headers::Headers;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const SERVER_NAME: &str = "yggdrasil-gateway";

/// Streaming body source.
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

/// Where the response body comes from.
pub enum Body {
    Empty,
    Full(Bytes),
    /// `length` of `None` means the body is sent chunked.
    Stream {
        stream: BodyStream,
        length: Option<u64>,
    },
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Full(b) => f.debug_tuple("Full").field(&b.len()).finish(),
            Body::Stream { length, .. } => f.debug_struct("Stream").field("length", length).finish(),
        }
    }
}

/// One HTTP response.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    content_type: Option<String>,
    headers: Headers,
    body: Body,
}

impl Response {
    /// Response with no body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            headers: Headers::new(),
            body: Body::Empty,
        }
    }

    /// Response whose body is fully known up front.
    pub fn fixed(status: StatusCode, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            headers: Headers::new(),
            body: Body::Full(body.into()),
        }
    }

    pub fn json(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::fixed(status, Some(JSON_CONTENT_TYPE), body)
    }

    /// Response streamed from `stream`. With `length` set, exactly that many
    /// bytes must be produced; otherwise the body is chunked.
    pub fn streaming(status: StatusCode, stream: BodyStream, length: Option<u64>) -> Self {
        Self {
            status,
            content_type: None,
            headers: Headers::new(),
            body: Body::Stream { stream, length },
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    /// Length the body will be framed with; `None` when chunked.
    pub fn content_length(&self) -> Option<u64> {
        match &self.body {
            Body::Empty => Some(0),
            Body::Full(b) => Some(b.len() as u64),
            Body::Stream { length, .. } => *length,
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.content_length().is_none()
    }

    pub fn wants_close(&self) -> bool {
        self.headers.has_token("connection", "close")
    }

    /// Collect the body into memory. Intended for tests and small payloads.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        match self.body {
            Body::Empty => Ok(Bytes::new()),
            Body::Full(b) => Ok(b),
            Body::Stream { mut stream, .. } => {
                let mut out = Vec::new();
                while let Some(chunk) = stream.next().await {
                    out.extend_from_slice(&chunk?);
                }
                Ok(out.into())
            }
        }
    }
}

fn allows_body(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
}

fn is_framing_header(name: &str) -> bool {
    ["content-length", "transfer-encoding", "connection"]
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// How the session wants the response written.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    pub keep_alive: bool,
    /// Response to a HEAD request: head only.
    pub head_only: bool,
}

/// Serialize `response` onto `out`.
pub async fn write_response<W: AsyncWrite + Unpin + ?Sized>(
    out: &mut W,
    response: Response,
    options: WriteOptions,
) -> Result<(), CodecError> {
    let Response {
        status,
        content_type,
        headers,
        body,
    } = response;
    let body_allowed = allows_body(status);

    let mut head = String::with_capacity(256);
    head.push_str("HTTP/1.1 ");
    head.push_str(status.as_str());
    head.push(' ');
    head.push_str(status.canonical_reason().unwrap_or("Unknown"));
    head.push_str("\r\n");

    if !headers.contains("date") {
        push_header(&mut head, "Date", &http_date(chrono::Utc::now()));
    }
    if !headers.contains("server") {
        push_header(&mut head, "Server", SERVER_NAME);
    }
    if let Some(ct) = content_type.as_deref() {
        if !headers.contains("content-type") {
            push_header(&mut head, "Content-Type", ct);
        }
    }
    for (name, value) in headers.iter() {
        if !is_framing_header(name) {
            push_header(&mut head, name, value);
        }
    }

    let length = match &body {
        Body::Empty => Some(0),
        Body::Full(b) => Some(b.len() as u64),
        Body::Stream { length, .. } => *length,
    };
    if body_allowed {
        match length {
            Some(n) => push_header(&mut head, "Content-Length", &n.to_string()),
            None => push_header(&mut head, "Transfer-Encoding", "chunked"),
        }
    }
    push_header(
        &mut head,
        "Connection",
        if options.keep_alive { "keep-alive" } else { "close" },
    );
    head.push_str("\r\n");
    out.write_all(head.as_bytes()).await?;

    if body_allowed && !options.head_only {
        match body {
            Body::Empty => {}
            Body::Full(bytes) => out.write_all(&bytes).await?,
            Body::Stream {
                mut stream,
                length: Some(expected),
            } => {
                let mut written = 0u64;
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    written += chunk.len() as u64;
                    if written > expected {
                        return Err(CodecError::Io(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "body longer than its declared length",
                        )));
                    }
                    out.write_all(&chunk).await?;
                }
                if written != expected {
                    return Err(CodecError::TruncatedBody);
                }
            }
            Body::Stream {
                mut stream,
                length: None,
            } => {
                let mut writer = ChunkedWriter::new(&mut *out);
                while let Some(chunk) = stream.next().await {
                    writer.write_chunk(&chunk?).await?;
                }
                writer.finish().await?;
            }
        }
    }
    out.flush().await?;
    Ok(())
}

fn push_header(head: &mut String, name: &str, value: &str) {
    head.push_str(name);
    head.push_str(": ");
    head.push_str(value);
    head.push_str("\r\n");
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
