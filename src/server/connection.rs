//! Per-connection handling
//!
//! A connection opens with one request line naming the role and target
//! path, then carries FLV in one direction:
//!
//! ```text
//! PUBLISH /live/cam1\n<FLV bytes from client>
//! PLAY /live/cam1\n   <FLV bytes from server>
//! ```

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader, BufWriter};

use crate::error::{Error, ProtocolError, Result};
use crate::session::{
    run_play, run_publish, PlayReport, PublishReport, SessionContext, SessionServices,
};

use super::transport::{FlvSink, FlvSource};

/// Longest accepted request line, excluding the terminator
pub const MAX_REQUEST_LINE: usize = 4096;

/// Role a connection asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Publish(String),
    Play(String),
}

impl Request {
    pub fn path(&self) -> &str {
        match self {
            Request::Publish(path) | Request::Play(path) => path,
        }
    }
}

/// Outcome of a served connection
#[derive(Debug)]
pub enum SessionReport {
    Publish(PublishReport),
    Play(PlayReport),
}

/// Parse `PUBLISH <path>` or `PLAY <path>`. The verb is case-insensitive and
/// a missing path addresses the default stream.
pub fn parse_request_line(line: &str) -> std::result::Result<Request, ProtocolError> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let mut parts = line.split_ascii_whitespace();

    let verb = parts
        .next()
        .ok_or_else(|| ProtocolError::InvalidRequest("empty request line".into()))?;
    let path = parts.next().unwrap_or_default().to_string();

    if parts.next().is_some() {
        return Err(ProtocolError::InvalidRequest(line.to_string()));
    }

    if verb.eq_ignore_ascii_case("PUBLISH") {
        Ok(Request::Publish(path))
    } else if verb.eq_ignore_ascii_case("PLAY") {
        Ok(Request::Play(path))
    } else {
        Err(ProtocolError::InvalidRequest(line.to_string()))
    }
}

/// Read and parse the request line, leaving everything after it buffered in
/// `reader`
pub async fn read_request<R>(reader: &mut R, timeout: Duration) -> Result<Request>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = MAX_REQUEST_LINE as u64 + 1;

    let read = tokio::time::timeout(timeout, (&mut *reader).take(limit).read_until(b'\n', &mut buf))
        .await
        .map_err(|_| ProtocolError::RequestTimeout)??;

    if buf.last() != Some(&b'\n') {
        if buf.len() > MAX_REQUEST_LINE {
            return Err(ProtocolError::RequestTooLong(MAX_REQUEST_LINE).into());
        }
        if read == 0 {
            return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        return Err(ProtocolError::InvalidRequest("unterminated request line".into()).into());
    }

    let line = std::str::from_utf8(&buf)
        .map_err(|_| ProtocolError::InvalidRequest("request line is not UTF-8".into()))?;
    Ok(parse_request_line(line)?)
}

/// Serve one connection: read its request line and run the matching session
pub async fn serve<S>(
    ctx: &SessionContext,
    stream: S,
    services: &SessionServices,
    request_timeout: Duration,
) -> Result<SessionReport>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    let request = read_request(&mut reader, request_timeout).await?;
    tracing::debug!(session_id = ctx.session_id, request = ?request, "Request received");

    match request {
        Request::Publish(path) => {
            let mut source = FlvSource::new(path, reader);
            let report = run_publish(ctx, &mut source, services).await?;
            Ok(SessionReport::Publish(report))
        }
        Request::Play(path) => {
            let mut sink = FlvSink::new(path, BufWriter::new(write_half));
            let report = run_play(ctx, &mut sink, &services.registry).await?;
            Ok(SessionReport::Play(report))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_line() {
        assert_eq!(
            parse_request_line("PUBLISH /live/cam1\r\n").unwrap(),
            Request::Publish("/live/cam1".into())
        );
        assert_eq!(
            parse_request_line("play live/cam1\n").unwrap(),
            Request::Play("live/cam1".into())
        );
        assert_eq!(parse_request_line("Play").unwrap(), Request::Play(String::new()));
    }

    #[test]
    fn test_parse_request_line_rejects() {
        for line in ["", "\r\n", "GET / HTTP/1.1", "DELETE /x", "PLAY a b"] {
            assert!(
                matches!(parse_request_line(line), Err(ProtocolError::InvalidRequest(_))),
                "{line:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_read_request_leaves_body_buffered() {
        let input: &[u8] = b"PUBLISH /live/a\nFLV\x01";
        let mut reader = BufReader::new(input);

        let request = read_request(&mut reader, Duration::from_secs(1)).await.unwrap();
        assert_eq!(request, Request::Publish("/live/a".into()));

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"FLV\x01");
    }

    #[tokio::test]
    async fn test_read_request_too_long() {
        let mut line = vec![b'A'; MAX_REQUEST_LINE + 10];
        line.push(b'\n');
        let mut reader = BufReader::new(&line[..]);

        let err = read_request(&mut reader, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::RequestTooLong(_))));
    }

    #[tokio::test]
    async fn test_read_request_eof() {
        let mut reader = BufReader::new(&b""[..]);
        let err = read_request(&mut reader, Duration::from_secs(1)).await.unwrap_err();
        assert!(err.is_disconnect());

        let mut reader = BufReader::new(&b"PLAY /a"[..]);
        let err = read_request(&mut reader, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::InvalidRequest(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_request_timeout() {
        let (client, server) = tokio::io::duplex(64);
        let mut reader = BufReader::new(server);

        let err = read_request(&mut reader, Duration::from_secs(10)).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::RequestTimeout)));
        drop(client);
    }
}
