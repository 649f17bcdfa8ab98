//! HTTP/1.1 body framing.
//!
//! # Responsibilities
//! - Fixed-length body reader bounded by a declared `Content-Length`
//! - Chunked body reader (`<hex-len>\r\n<data>\r\n ... 0\r\n\r\n`)
//! - Chunked body writer used for responses of unknown length
//!
//! # Design Decisions
//! - Readers never consume bytes past the end of their own message, so a
//!   keep-alive connection stays aligned for the next request
//! - End of stream before the framing says we are done is `TruncatedBody`,
//!   never a short successful read
//! - The chunk size is capped the same way a signed 32-bit length would be:
//!   any digit that would set one of the top five bits is rejected

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Errors produced while framing a message body.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed chunk: {0}")]
    MalformedChunk(&'static str),

    #[error("connection closed before the end of the message body")]
    TruncatedBody,

    #[error("chunked stream already finished")]
    StreamFinished,

    #[error("message body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

const OVERFLOW_GUARD: u32 = 0xF800_0000;

/// Reads exactly `length` bytes from the underlying stream, then reports EOF.
#[derive(Debug)]
pub struct FixedLengthReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: AsyncRead + Unpin> FixedLengthReader<R> {
    pub fn new(inner: R, length: u64) -> Self {
        Self {
            inner,
            remaining: length,
        }
    }

    /// Bytes of the declared body that have not been read yet.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Read up to `buf.len()` bytes of the body. Returns 0 once the declared
    /// length has been consumed.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, CodecError> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max]).await?;
        if n == 0 {
            return Err(CodecError::TruncatedBody);
        }
        self.remaining -= n as u64;
        Ok(n)
    }

    /// Consume and discard the rest of the body.
    pub async fn drain(&mut self) -> Result<u64, CodecError> {
        let mut scratch = [0u8; 4096];
        let mut drained = 0u64;
        loop {
            let n = self.read(&mut scratch).await?;
            if n == 0 {
                return Ok(drained);
            }
            drained += n as u64;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    /// Expecting a `<hex>\r\n` size line.
    Size,
    /// Inside a chunk's payload.
    Data(u32),
    /// Payload done, expecting its trailing CRLF.
    DataEnd,
    /// Terminating chunk and its CRLF consumed.
    Done,
}

/// Decodes a `Transfer-Encoding: chunked` body.
#[derive(Debug)]
pub struct ChunkedReader<R> {
    inner: R,
    state: ChunkState,
}

impl<R: AsyncRead + Unpin> ChunkedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            state: ChunkState::Size,
        }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// True once the terminating zero-length chunk has been consumed.
    pub fn is_finished(&self) -> bool {
        self.state == ChunkState::Done
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, CodecError> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.state {
                ChunkState::Done => return Ok(0),
                ChunkState::Size => {
                    let length = self.read_chunk_length().await?;
                    if length == 0 {
                        self.expect_crlf().await?;
                        self.state = ChunkState::Done;
                        return Ok(0);
                    }
                    self.state = ChunkState::Data(length);
                }
                ChunkState::Data(left) => {
                    let max = buf.len().min(left as usize);
                    let n = self.inner.read(&mut buf[..max]).await?;
                    if n == 0 {
                        return Err(CodecError::TruncatedBody);
                    }
                    let left = left - n as u32;
                    self.state = if left == 0 {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data(left)
                    };
                    return Ok(n);
                }
                ChunkState::DataEnd => {
                    self.expect_crlf().await?;
                    self.state = ChunkState::Size;
                }
            }
        }
    }

    pub async fn drain(&mut self) -> Result<u64, CodecError> {
        let mut scratch = [0u8; 4096];
        let mut drained = 0u64;
        loop {
            let n = self.read(&mut scratch).await?;
            if n == 0 {
                return Ok(drained);
            }
            drained += n as u64;
        }
    }

    async fn next_byte(&mut self) -> Result<u8, CodecError> {
        match self.inner.read_u8().await {
            Ok(b) => Ok(b),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(CodecError::TruncatedBody),
            Err(e) => Err(CodecError::Io(e)),
        }
    }

    async fn read_chunk_length(&mut self) -> Result<u32, CodecError> {
        let mut length: u32 = 0;
        let mut digits = 0usize;
        loop {
            let b = self.next_byte().await?;
            if b == b'\r' {
                break;
            }
            let digit = (b as char)
                .to_digit(16)
                .ok_or(CodecError::MalformedChunk("invalid chunk length digit"))?;
            if length & OVERFLOW_GUARD != 0 {
                return Err(CodecError::MalformedChunk("chunk length too large"));
            }
            length = (length << 4) | digit;
            digits += 1;
        }
        if self.next_byte().await? != b'\n' {
            return Err(CodecError::MalformedChunk("missing LF after chunk length"));
        }
        if digits == 0 {
            return Err(CodecError::MalformedChunk("empty chunk length"));
        }
        Ok(length)
    }

    async fn expect_crlf(&mut self) -> Result<(), CodecError> {
        if self.next_byte().await? != b'\r' || self.next_byte().await? != b'\n' {
            return Err(CodecError::MalformedChunk("missing CRLF after chunk"));
        }
        Ok(())
    }
}

/// Encodes a body as a sequence of chunks. Every non-empty write becomes one
/// chunk; `finish` emits the terminator.
#[derive(Debug)]
pub struct ChunkedWriter<W> {
    inner: W,
    finished: bool,
}

impl<W: AsyncWrite + Unpin> ChunkedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            finished: false,
        }
    }

    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<(), CodecError> {
        if self.finished {
            return Err(CodecError::StreamFinished);
        }
        if data.is_empty() {
            return Ok(());
        }
        let size_line = format!("{:x}\r\n", data.len());
        self.inner.write_all(size_line.as_bytes()).await?;
        self.inner.write_all(data).await?;
        self.inner.write_all(b"\r\n").await?;
        Ok(())
    }

    pub async fn finish(&mut self) -> Result<(), CodecError> {
        if self.finished {
            return Err(CodecError::StreamFinished);
        }
        self.finished = true;
        self.inner.write_all(b"0\r\n\r\n").await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn decode_all(input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut reader = ChunkedReader::new(input);
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[tokio::test]
    async fn chunked_decodes_wikipedia() {
        let body = decode_all(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n").await.unwrap();
        assert_eq!(body, b"Wikipedia");
    }

    #[tokio::test]
    async fn chunked_stops_at_terminator() {
        let input: &[u8] = b"3\r\nabc\r\n0\r\n\r\nGET / HTTP/1.1";
        let mut cursor = input;
        let mut reader = ChunkedReader::new(&mut cursor);
        let drained = reader.drain().await.unwrap();
        assert_eq!(drained, 3);
        assert!(reader.is_finished());
        assert_eq!(cursor, b"GET / HTTP/1.1");
    }

    #[tokio::test]
    async fn chunked_accepts_uppercase_hex() {
        let mut input = b"A\r\n".to_vec();
        input.extend_from_slice(&[b'x'; 10]);
        input.extend_from_slice(b"\r\n0\r\n\r\n");
        assert_eq!(decode_all(&input).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn truncated_chunk_is_reported() {
        let err = decode_all(b"a\r\n123456789a\r").await.unwrap_err();
        assert!(matches!(err, CodecError::TruncatedBody));

        let err = decode_all(b"a\r\n12345").await.unwrap_err();
        assert!(matches!(err, CodecError::TruncatedBody));

        let err = decode_all(b"4\r\nWiki\r\n0\r\n").await.unwrap_err();
        assert!(matches!(err, CodecError::TruncatedBody));
    }

    #[tokio::test]
    async fn malformed_chunks_are_rejected() {
        let err = decode_all(b"4x\r\nWiki\r\n0\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, CodecError::MalformedChunk(_)));

        let err = decode_all(b"4\r\nWikiXY0\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, CodecError::MalformedChunk(_)));

        let err = decode_all(b"4\rXWiki\r\n0\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, CodecError::MalformedChunk(_)));

        let err = decode_all(b"\r\n").await.unwrap_err();
        assert!(matches!(err, CodecError::MalformedChunk(_)));
    }

    #[tokio::test]
    async fn oversized_chunk_length_is_rejected() {
        let err = decode_all(b"100000000\r\n").await.unwrap_err();
        assert!(matches!(err, CodecError::MalformedChunk(_)));

        let err = decode_all(b"ffffffff0\r\n").await.unwrap_err();
        assert!(matches!(err, CodecError::MalformedChunk(_)));
    }

    #[tokio::test]
    async fn fixed_length_never_reads_past_declared_count() {
        let input: &[u8] = b"helloworld";
        let mut cursor = input;
        let mut reader = FixedLengthReader::new(&mut cursor, 5);
        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(cursor, b"world");
    }

    #[tokio::test]
    async fn fixed_length_drain_keeps_stream_aligned() {
        let input: &[u8] = b"0123456789NEXT";
        let mut cursor = input;
        let mut reader = FixedLengthReader::new(&mut cursor, 10);
        let mut buf = [0u8; 2];
        reader.read(&mut buf).await.unwrap();
        assert_eq!(reader.drain().await.unwrap(), 8);
        assert_eq!(cursor, b"NEXT");
    }

    #[tokio::test]
    async fn fixed_length_truncation() {
        let mut reader = FixedLengthReader::new(&b"abc"[..], 5);
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 3);
        assert!(matches!(reader.read(&mut buf).await, Err(CodecError::TruncatedBody)));
    }

    #[tokio::test]
    async fn chunked_writer_frames_each_write() {
        let mut writer = ChunkedWriter::new(Vec::new());
        writer.write_chunk(b"Wiki").await.unwrap();
        writer.write_chunk(b"").await.unwrap();
        writer.write_chunk(b"pedia in chunks.").await.unwrap();
        writer.finish().await.unwrap();
        assert!(matches!(writer.write_chunk(b"late").await, Err(CodecError::StreamFinished)));

        let encoded = writer.into_inner();
        assert_eq!(encoded, b"4\r\nWiki\r\n10\r\npedia in chunks.\r\n0\r\n\r\n".to_vec());
        assert_eq!(decode_all(&encoded).await.unwrap(), b"Wikipedia in chunks.");
    }
}
