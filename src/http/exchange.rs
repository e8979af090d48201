//! The request descriptor handed to route handlers.
//!
//! The router never sees sockets or byte streams. It only needs the method, the
//! request-target and a way to answer; handlers may also read the request body.
//! That is exactly what [`Exchange`] exposes.
//! [`HttpExchange`] is the implementation the TCP adapter uses.

use tracing::warn;

use super::{Method, Request, Response, StatusCode};

/// One in-flight request as seen by the router and its handlers.
///
/// Handlers produce output by calling [`respond`](Self::respond); they return nothing.
///
/// # Examples
///
/// ```
/// use nestor::http::{Exchange, HttpExchange, Request, StatusCode};
///
/// let (request, _) = Request::parse(b"GET /ping HTTP/1.1\r\n\r\n").unwrap();
/// let mut exchange = HttpExchange::new(request);
/// exchange.respond_text(StatusCode::Ok, "pong");
///
/// let response = exchange.into_response().unwrap();
/// assert_eq!(response.content(), b"pong");
/// ```
pub trait Exchange {
    /// The request method.
    fn method(&self) -> Method;

    /// The request-target, including any query component.
    fn url(&self) -> &str;

    /// The request body; empty when none was sent.
    fn body(&self) -> &[u8];

    /// Deliver the response for this request.
    fn respond(&mut self, response: Response);

    /// Shorthand for responding with a status and a plain-text body.
    fn respond_text(&mut self, status: StatusCode, body: &str) {
        self.respond(Response::new(status).body(body));
    }
}

/// An [`Exchange`] over a parsed HTTP/1.1 [`Request`].
///
/// Only the first response is kept; a handler that responds twice gets a warning and the
/// later response is dropped.
#[derive(Debug)]
pub struct HttpExchange {
    request: Request,
    response: Option<Response>,
}

impl HttpExchange {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: None,
        }
    }

    /// Returns `true` once a handler has responded.
    pub fn has_responded(&self) -> bool {
        self.response.is_some()
    }

    /// Consume the exchange, yielding the response if one was delivered.
    pub fn into_response(self) -> Option<Response> {
        self.response
    }
}

impl Exchange for HttpExchange {
    fn method(&self) -> Method {
        self.request.method()
    }

    fn url(&self) -> &str {
        self.request.target()
    }

    fn body(&self) -> &[u8] {
        self.request.body()
    }

    fn respond(&mut self, response: Response) {
        if self.response.is_some() {
            warn!(
                url = %self.request.target(),
                status = %response.status(),
                "response already sent — dropping second response"
            );
            return;
        }
        self.response = Some(response);
    }
}
