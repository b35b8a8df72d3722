use crate::http::request::{Method, Request};
use std::collections::HashMap;
use std::ops::Range;

/// Upper bound on an inbound request body.
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Upper bound on the request line plus headers.
pub const MAX_HEADER_SIZE: usize = 64 * 1024;

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    InvalidRequest,
    InvalidMethod,
    InvalidHeader,
    InvalidContentLength,
    InvalidChunk,
    HeadersTooLarge,
    BodyTooLarge,
    Incomplete,
}

impl ParseError {
    /// Errors raised after the request line and headers were understood,
    /// i.e. while reading the body.
    pub fn is_body_error(&self) -> bool {
        matches!(
            self,
            ParseError::InvalidContentLength | ParseError::InvalidChunk | ParseError::BodyTooLarge
        )
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ParseError::InvalidRequest => "invalid request line",
            ParseError::InvalidMethod => "unsupported method",
            ParseError::InvalidHeader => "malformed header",
            ParseError::InvalidContentLength => "invalid Content-Length",
            ParseError::InvalidChunk => "malformed chunked body",
            ParseError::HeadersTooLarge => "request headers too large",
            ParseError::BodyTooLarge => "request body too large",
            ParseError::Incomplete => "incomplete request",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ParseError {}

/// Parses one request from the front of `buf`.
///
/// Returns the request and the number of bytes it occupied, or
/// `ParseError::Incomplete` when more input is needed.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    let headers_end = match find_headers_end(buf) {
        Some(end) => end,
        None if buf.len() > MAX_HEADER_SIZE => return Err(ParseError::HeadersTooLarge),
        None => return Err(ParseError::Incomplete),
    };
    let header_bytes = &buf[..headers_end];
    let body_start = headers_end + 4;
    let body_bytes = &buf[body_start..];

    let headers_str = std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    let mut parts = lines.next().ok_or(ParseError::InvalidRequest)?.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let path = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    // Repeated headers keep their first value.
    let mut headers: HashMap<String, String> = HashMap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::InvalidHeader);
        }

        if !headers.keys().any(|k| k.eq_ignore_ascii_case(key)) {
            headers.insert(key.to_string(), value.trim().to_string());
        }
    }

    let lookup = |name: &str| {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    };

    let chunked = lookup("Transfer-Encoding")
        .map(|v| v.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);

    let (body, body_len) = if chunked {
        decode_chunked(body_bytes)?
    } else {
        let content_length = lookup("Content-Length")
            .map(|v| v.parse::<usize>().map_err(|_| ParseError::InvalidContentLength))
            .transpose()?
            .unwrap_or(0);

        if content_length > MAX_BODY_SIZE {
            return Err(ParseError::BodyTooLarge);
        }

        if body_bytes.len() < content_length {
            return Err(ParseError::Incomplete);
        }

        (body_bytes[..content_length].to_vec(), content_length)
    };

    let request = Request {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
        body,
    };

    Ok((request, body_start + body_len))
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Decodes a chunked body, returning the payload and the bytes consumed.
///
/// The framing is checked first without copying, so a body still arriving
/// costs only a walk over its chunk headers. The payload is copied once,
/// when the terminating chunk is in the buffer.
fn decode_chunked(buf: &[u8]) -> Result<(Vec<u8>, usize), ParseError> {
    let (chunks, consumed) = chunk_ranges(buf)?;

    let mut body = Vec::with_capacity(chunks.iter().map(|c| c.len()).sum());
    for chunk in chunks {
        body.extend_from_slice(&buf[chunk]);
    }

    Ok((body, consumed))
}

/// Locates every chunk's data in `buf`. Chunk extensions are ignored and
/// trailers are skipped.
fn chunk_ranges(buf: &[u8]) -> Result<(Vec<Range<usize>>, usize), ParseError> {
    let mut chunks = Vec::new();
    let mut total = 0usize;
    let mut pos = 0;

    loop {
        let line_end = find_crlf(&buf[pos..]).ok_or(ParseError::Incomplete)?;
        let size_line = std::str::from_utf8(&buf[pos..pos + line_end])
            .map_err(|_| ParseError::InvalidChunk)?;
        let size_str = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_str, 16).map_err(|_| ParseError::InvalidChunk)?;
        pos += line_end + 2;

        if size == 0 {
            // Trailer section ends with an empty line.
            loop {
                let end = find_crlf(&buf[pos..]).ok_or(ParseError::Incomplete)?;
                pos += end + 2;
                if end == 0 {
                    return Ok((chunks, pos));
                }
            }
        }

        if size > MAX_BODY_SIZE - total {
            return Err(ParseError::BodyTooLarge);
        }

        if buf.len() < pos + size + 2 {
            return Err(ParseError::Incomplete);
        }

        chunks.push(pos..pos + size);
        total += size;
        pos += size;

        if &buf[pos..pos + 2] != b"\r\n" {
            return Err(ParseError::InvalidChunk);
        }
        pos += 2;
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_post() {
        let req = b"POST /hook HTTP/1.1\r\nHost: example.com\r\nContent-Length: 2\r\n\r\n{}";

        let (parsed, consumed) = parse_http_request(req).unwrap();

        assert_eq!(parsed.path, "/hook");
        assert_eq!(parsed.body, b"{}");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn chunked_body_arriving_in_pieces() {
        let mut req = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
        for chunk in ["hello", " ", "chunked", " world"] {
            req.extend_from_slice(format!("{:x}\r\n{chunk}\r\n", chunk.len()).as_bytes());
        }
        req.extend_from_slice(b"0\r\n\r\n");

        for cut in 1..req.len() {
            assert_eq!(
                parse_http_request(&req[..cut]).unwrap_err(),
                ParseError::Incomplete,
                "prefix of {cut} bytes"
            );
        }

        let (parsed, consumed) = parse_http_request(&req).unwrap();
        assert_eq!(parsed.body, b"hello chunked world");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn chunk_ranges_point_into_buffer() {
        let buf = b"3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n";

        let (chunks, consumed) = chunk_ranges(buf).unwrap();

        assert_eq!(chunks, vec![3..6, 11..13]);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn chunked_body_with_extension_and_trailer() {
        let req = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3;ext=1\r\nabc\r\n0\r\nX-Trailer: 1\r\n\r\n";

        let (parsed, consumed) = parse_http_request(req).unwrap();

        assert_eq!(parsed.body, b"abc");
        assert_eq!(consumed, req.len());
    }
}
