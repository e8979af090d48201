//! HTTP protocol types shared by the router and the TCP adapter.
//!
//! This module provides [`Method`], [`StatusCode`], [`Request`], [`Response`], and the
//! [`Exchange`] request descriptor that handlers receive.

use std::fmt;

use thiserror::Error;

pub mod exchange;
pub mod request;
pub mod response;

pub use exchange::{Exchange, HttpExchange};
pub use request::Request;
pub use response::Response;

/// An HTTP response status code.
///
/// # Examples
///
/// ```
/// use nestor::http::StatusCode;
///
/// let status = StatusCode::NotFound;
/// assert_eq!(status.as_u16(), 404);
/// assert_eq!(status.canonical_reason(), "Not Found");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    // 2xx Success
    Ok = 200,
    Created = 201,
    Accepted = 202,
    NoContent = 204,

    // 3xx Redirection
    MovedPermanently = 301,
    Found = 302,
    SeeOther = 303,
    NotModified = 304,

    // 4xx Client Error
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    Conflict = 409,
    PayloadTooLarge = 413,
    UnprocessableEntity = 422,

    // 5xx Server Error
    InternalServerError = 500,
    NotImplemented = 501,
    ServiceUnavailable = 503,
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the canonical reason phrase for this status code.
    pub fn canonical_reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Created => "Created",
            Self::Accepted => "Accepted",
            Self::NoContent => "No Content",
            Self::MovedPermanently => "Moved Permanently",
            Self::Found => "Found",
            Self::SeeOther => "See Other",
            Self::NotModified => "Not Modified",
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::Conflict => "Conflict",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::UnprocessableEntity => "Unprocessable Entity",
            Self::InternalServerError => "Internal Server Error",
            Self::NotImplemented => "Not Implemented",
            Self::ServiceUnavailable => "Service Unavailable",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

/// An HTTP request method the router can bind handlers to.
///
/// Only the four methods handlers can be registered for are representable. Any other
/// token fails to parse with [`UnsupportedMethod`].
///
/// # Examples
///
/// ```
/// use nestor::http::Method;
///
/// let method: Method = "PUT".parse().unwrap();
/// assert_eq!(method, Method::Put);
/// assert_eq!(method.as_str(), "PUT");
/// assert!("PATCH".parse::<Method>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Every supported method, in declaration order.
    pub const ALL: [Method; 4] = [Method::Get, Method::Post, Method::Put, Method::Delete];

    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    // Dense slot index, used by per-pattern method tables.
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Get => 0,
            Self::Post => 1,
            Self::Put => 2,
            Self::Delete => 3,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a method token outside GET, POST, PUT and DELETE.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnsupportedMethod(pub String);

impl std::str::FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(UnsupportedMethod(other.to_owned())),
        }
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_round_trips_through_str() {
        for method in Method::ALL {
            assert_eq!(method.as_str().parse::<Method>(), Ok(method));
        }
    }

    #[test]
    fn method_rejects_unsupported_tokens() {
        assert_eq!(
            "HEAD".parse::<Method>(),
            Err(UnsupportedMethod("HEAD".to_owned()))
        );
        // Method tokens are case-sensitive.
        assert!("get".parse::<Method>().is_err());
    }

    #[test]
    fn method_indices_are_dense() {
        let indices: Vec<_> = Method::ALL.iter().map(|m| m.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn status_display() {
        assert_eq!(StatusCode::NotFound.to_string(), "404 Not Found");
        assert_eq!(u16::from(StatusCode::NotImplemented), 501);
    }
}
