//! HTTP/1.1 request parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;

use super::{Method, UnsupportedMethod};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error(transparent)]
    Method(#[from] UnsupportedMethod),

    #[error("invalid Content-Length header")]
    InvalidContentLength,
}

/// A parsed HTTP/1.1 request head plus whatever body bytes were already buffered.
///
/// Besides the method, the request-target and the body handed to handlers through
/// [`Exchange`](super::Exchange), the request keeps the connection-level details the TCP
/// adapter needs: the keep-alive decision and the declared body length.
///
/// An absolute-form target (`http://host/path?query`) is reduced to its origin form
/// (`/path?query`) so it routes like any other request.
///
/// # Examples
///
/// ```
/// use nestor::http::{Method, Request};
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method(), Method::Get);
/// assert_eq!(request.target(), "/hello?name=world");
/// assert_eq!(request.path(), "/hello");
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    target: String,
    keep_alive: bool,
    content_length: usize,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf` (i.e. immediately after the `\r\n\r\n` header terminator).
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed to complete the request headers.
    /// - [`RequestError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`] — a required field (method, path, version) is absent.
    /// - [`RequestError::Method`] — the method is not one the router can dispatch.
    /// - [`RequestError::InvalidContentLength`] — `Content-Length` is not a number, or
    ///   the body it announces would end past the addressable range.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse()?;

        let target = origin_form(
            raw_req
                .path
                .ok_or(RequestError::MissingField { field: "path" })?,
        );

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut connection = None;
        let mut content_length = 0;
        for header in raw_req.headers.iter() {
            let Ok(value) = std::str::from_utf8(header.value) else {
                continue;
            };
            if header.name.eq_ignore_ascii_case("connection") {
                connection = Some(value.trim().to_owned());
            } else if header.name.eq_ignore_ascii_case("content-length") {
                content_length = value
                    .trim()
                    .parse()
                    .map_err(|_| RequestError::InvalidContentLength)?;
            }
        }

        // HTTP/1.1 defaults to keep-alive, HTTP/1.0 to close.
        let keep_alive = match connection {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => version == 1,
        };

        let body_end = body_offset
            .checked_add(content_length)
            .ok_or(RequestError::InvalidContentLength)?;
        let body = Bytes::copy_from_slice(&buf[body_offset..buf.len().min(body_end)]);

        Ok((
            Self {
                method,
                target,
                keep_alive,
                content_length,
                body,
            },
            body_offset,
        ))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the raw request-target, including any query component.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the request path (the target without its query string).
    pub fn path(&self) -> &str {
        match self.target.find('?') {
            Some(pos) => &self.target[..pos],
            None => &self.target,
        }
    }

    /// Returns `true` if the connection should be kept alive after this request.
    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Returns the declared `Content-Length`, or `0` when the header is absent.
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Returns the body bytes that were buffered when the request was parsed.
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

// Strip `scheme://authority` from an absolute-form target; an empty path becomes `/`.
fn origin_form(target: &str) -> String {
    if target.starts_with('/') {
        return target.to_owned();
    }
    let Some((_scheme, rest)) = target.split_once("://") else {
        return target.to_owned();
    };
    match rest.find(['/', '?']) {
        Some(pos) if rest[pos..].starts_with('/') => rest[pos..].to_owned(),
        Some(pos) => format!("/{}", &rest[pos..]),
        None => "/".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.target(), "/");
        assert_eq!(offset, raw.len()); // no body
    }

    #[test]
    fn target_keeps_query() {
        let raw = b"GET /search?q=rust&page=2 HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.target(), "/search?q=rust&page=2");
        assert_eq!(req.path(), "/search");
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn unsupported_method() {
        let raw = b"PATCH /users/1 HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert!(matches!(
            Request::parse(raw),
            Err(RequestError::Method(UnsupportedMethod(m))) if m == "PATCH"
        ));
    }

    #[test]
    fn keep_alive_http11_default() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert!(req.is_keep_alive());
    }

    #[test]
    fn keep_alive_http10_default() {
        let raw = b"GET / HTTP/1.0\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert!(!req.is_keep_alive());
    }

    #[test]
    fn connection_close() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert!(!req.is_keep_alive());
    }

    #[test]
    fn content_length_and_body() {
        let raw = b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
        let (req, body_offset) = Request::parse(raw).unwrap();
        assert_eq!(req.content_length(), 5);
        assert_eq!(&raw[body_offset..], b"hello");
        assert_eq!(&req.body()[..], b"hello");
    }

    #[test]
    fn overflowing_content_length_is_rejected() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\n";
        assert!(matches!(
            Request::parse(raw),
            Err(RequestError::InvalidContentLength)
        ));
    }

    #[test]
    fn absolute_form_target_is_reduced_to_origin_form() {
        let raw = b"GET http://example.com/api/x?y=1 HTTP/1.1\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.target(), "/api/x?y=1");
        assert_eq!(req.path(), "/api/x");

        let (bare, _) = Request::parse(b"GET http://example.com HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(bare.target(), "/");

        let (query, _) = Request::parse(b"GET http://example.com?q HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(query.target(), "/?q");
    }

    #[test]
    fn origin_form_target_is_untouched() {
        let raw = b"GET /redirect?to=http://elsewhere/ HTTP/1.1\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.target(), "/redirect?to=http://elsewhere/");
    }

    #[test]
    fn invalid_content_length() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\n";
        assert!(matches!(
            Request::parse(raw),
            Err(RequestError::InvalidContentLength)
        ));
    }
}
