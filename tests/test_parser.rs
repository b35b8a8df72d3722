use webhook_proxy::http::parser::{parse_http_request, ParseError, MAX_BODY_SIZE};
use webhook_proxy::http::request::Method;

#[test]
fn test_parse_webhook_post() {
    let req = b"POST /hooks/github HTTP/1.1\r\nHost: relay\r\nContent-Type: application/json\r\nContent-Length: 11\r\n\r\n{\"ok\":true}";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.method, Method::POST);
    assert_eq!(parsed.path, "/hooks/github");
    assert_eq!(parsed.version, "HTTP/1.1");
    assert_eq!(parsed.header("content-type"), Some("application/json"));
    assert_eq!(parsed.body, b"{\"ok\":true}".to_vec());
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_lowercase_content_length() {
    let req = b"POST / HTTP/1.1\r\ncontent-length: 5\r\n\r\nhello";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.body, b"hello".to_vec());
}

#[test]
fn test_parse_repeated_header_keeps_first_value() {
    let req = b"POST / HTTP/1.1\r\nX-Tag: first\r\nx-tag: second\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.headers.len(), 1);
    assert_eq!(parsed.header("X-Tag"), Some("first"));
}

#[test]
fn test_parse_pipelined_requests() {
    let req = b"POST /a HTTP/1.1\r\nContent-Length: 1\r\n\r\nxPOST /b HTTP/1.1\r\n\r\n";
    let (first, consumed) = parse_http_request(req).unwrap();
    let (second, rest) = parse_http_request(&req[consumed..]).unwrap();

    assert_eq!(first.path, "/a");
    assert_eq!(first.body, b"x".to_vec());
    assert_eq!(second.path, "/b");
    assert_eq!(consumed + rest, req.len());
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";

    assert!(matches!(parse_http_request(req), Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_incomplete_request_partial_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";

    assert!(matches!(parse_http_request(req), Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_chunked_body() {
    let req = b"POST /hook HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.body, b"hello world".to_vec());
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_chunked_body_incomplete() {
    let req = b"POST /hook HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhel";

    assert!(matches!(parse_http_request(req), Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_chunked_body_bad_size() {
    let req = b"POST /hook HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\nhello\r\n0\r\n\r\n";
    let err = parse_http_request(req).unwrap_err();

    assert_eq!(err, ParseError::InvalidChunk);
    assert!(err.is_body_error());
}

#[test]
fn test_parse_body_over_limit() {
    let req = format!(
        "POST /hook HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
        MAX_BODY_SIZE + 1
    );
    let err = parse_http_request(req.as_bytes()).unwrap_err();

    assert_eq!(err, ParseError::BodyTooLarge);
    assert!(err.is_body_error());
}

#[test]
fn test_parse_invalid_content_length() {
    let req = b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n";

    assert_eq!(
        parse_http_request(req).unwrap_err(),
        ParseError::InvalidContentLength
    );
}

#[test]
fn test_parse_invalid_http_method() {
    let req = b"BREW / HTTP/1.1\r\n\r\n";
    let err = parse_http_request(req).unwrap_err();

    assert_eq!(err, ParseError::InvalidMethod);
    assert!(!err.is_body_error());
}

#[test]
fn test_parse_malformed_header() {
    let req = b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n";

    assert_eq!(parse_http_request(req).unwrap_err(), ParseError::InvalidHeader);
}

#[test]
fn test_parse_oversized_headers() {
    let mut req = b"GET / HTTP/1.1\r\nX-Big: ".to_vec();
    req.extend(std::iter::repeat_n(b'a', 70 * 1024));

    assert_eq!(
        parse_http_request(&req).unwrap_err(),
        ParseError::HeadersTooLarge
    );
}
