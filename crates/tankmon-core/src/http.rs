//! Just enough HTTP/1.1 for the telemetry endpoint
//!
//! Requests are read up to the end of their headers by the transport; only
//! the request line matters here. Every response closes the connection.

use alloc::format;
use alloc::string::String;

use serde::Serialize;
use thiserror_no_std::Error;

/// Largest request head the transports buffer before parsing
pub const MAX_REQUEST_SIZE: usize = 1024;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("request is not valid UTF-8")]
    NotUtf8,
    #[error("malformed request line")]
    RequestLine,
    #[error("only HTTP/1.x is supported")]
    Version,
}

/// Request line of an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    pub method: &'a str,
    pub path: &'a str,
}

impl<'a> Request<'a> {
    /// Parse the request line. Bytes after the first line are never decoded,
    /// so a truncated header block cannot fail the parse.
    pub fn parse(raw: &'a [u8]) -> Result<Self, ParseError> {
        let line = match raw.iter().position(|&b| b == b'\n') {
            Some(end) => &raw[..end],
            None => raw,
        };
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let line = core::str::from_utf8(line).map_err(|_| ParseError::NotUtf8)?;

        let mut parts = line.split_ascii_whitespace();
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseError::RequestLine);
        };
        if method.is_empty() || !target.starts_with('/') {
            return Err(ParseError::RequestLine);
        }
        if !version.starts_with("HTTP/1.") {
            return Err(ParseError::Version);
        }

        // The endpoint takes no query parameters; ignore any that are sent.
        let path = target.split('?').next().unwrap_or(target);
        Ok(Self { method, path })
    }
}

/// Whether `buf` holds a complete request head. Bare LF line endings count.
pub fn head_complete(buf: &[u8]) -> bool {
    buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.windows(2).any(|w| w == b"\n\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    MethodNotAllowed,
}

impl Status {
    pub const fn line(self) -> &'static str {
        match self {
            Self::Ok => "200 OK",
            Self::BadRequest => "400 Bad Request",
            Self::NotFound => "404 Not Found",
            Self::MethodNotAllowed => "405 Method Not Allowed",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub body: String,
}

impl Response {
    pub fn ok_json(body: String) -> Self {
        Self {
            status: Status::Ok,
            body,
        }
    }

    pub fn bad_request(reason: &str) -> Self {
        Self::error(Status::BadRequest, reason)
    }

    pub fn not_found() -> Self {
        Self::error(Status::NotFound, "not found")
    }

    pub fn method_not_allowed() -> Self {
        Self::error(Status::MethodNotAllowed, "only GET is supported")
    }

    fn error(status: Status, reason: &str) -> Self {
        let body = serde_json::to_string(&ErrorBody { error: reason })
            .unwrap_or_else(|_| String::from("{}"));
        Self { status, body }
    }

    /// Status line and headers, including the blank line that ends them.
    pub fn head(&self) -> String {
        let allow = match self.status {
            Status::MethodNotAllowed => "Allow: GET\r\n",
            _ => "",
        };
        format!(
            "HTTP/1.1 {}\r\n\
             Content-Type: application/json\r\n\
             {}Connection: close\r\n\
             Content-Length: {}\r\n\
             \r\n",
            self.status.line(),
            allow,
            self.body.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_parse_request_line() {
        let request = Request::parse(b"GET /api/get-data HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/api/get-data");
    }

    #[test]
    fn test_parse_strips_query() {
        let request = Request::parse(b"GET /api/get-data?x=1 HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(request.path, "/api/get-data");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Request::parse(b"hello\r\n\r\n"), Err(ParseError::RequestLine));
        assert_eq!(Request::parse(b"GET api HTTP/1.1\r\n\r\n"), Err(ParseError::RequestLine));
        assert_eq!(Request::parse(b"GET / SPDY/3\r\n\r\n"), Err(ParseError::Version));
        assert_eq!(Request::parse(&[0xc3, 0x28]), Err(ParseError::NotUtf8));
    }

    #[test]
    fn test_parse_ignores_truncated_headers() {
        let mut raw = Vec::from(&b"GET /api/get-data HTTP/1.1\r\nX-Name: "[..]);
        while raw.len() < MAX_REQUEST_SIZE - 1 {
            raw.push(b'a');
        }
        // Buffer ends on the first byte of a two-byte character.
        raw.push(0xc3);
        assert_eq!(raw.len(), MAX_REQUEST_SIZE);

        let request = Request::parse(&raw).unwrap();
        assert_eq!(request.path, "/api/get-data");
    }

    #[test]
    fn test_bare_lf_requests() {
        let raw = b"GET /api/get-data HTTP/1.1\nHost: x\n\n";
        assert!(head_complete(raw));
        let request = Request::parse(raw).unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/api/get-data");
    }

    #[test]
    fn test_error_body_is_json() {
        let response = Response::bad_request("bad \"quote\"");
        let value: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(value["error"], "bad \"quote\"");
        assert_eq!(Response::not_found().body, r#"{"error":"not found"}"#);
    }

    #[test]
    fn test_head_complete() {
        assert!(!head_complete(b"GET / HTTP/1.1\r\n"));
        assert!(head_complete(b"GET / HTTP/1.1\r\n\r\n"));
    }

    #[test]
    fn test_response_head() {
        let response = Response::ok_json(String::from("{\"a\":1}"));
        assert_eq!(
            response.head(),
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\nContent-Length: 7\r\n\r\n"
        );

        let response = Response::method_not_allowed();
        assert!(response.head().starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(response.head().contains("Allow: GET\r\n"));
    }
}
