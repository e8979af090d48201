//! Async TCP adapter using Tokio.
//!
//! Accepts TCP connections, parses HTTP/1.1 requests and hands each one to a synchronous
//! per-request hook as an [`HttpExchange`]. The usual hook is [`Router::listen`](crate::Router::listen).
//! Supports HTTP/1.1 persistent connections (keep-alive) out of the box.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{
    Exchange, HttpExchange, StatusCode,
    request::{Request, RequestError},
    response::Response,
};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// A TCP listener that feeds parsed requests to a per-request hook.
///
/// # Examples
///
/// ```rust,no_run
/// use nestor::{Router, StatusCode};
/// use nestor::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut router = Router::new();
///     router.get("/", |ex, _| ex.respond_text(StatusCode::Ok, "Hello!"))?;
///
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(router.listen()).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and passing each request to `handler`.
    ///
    /// The hook runs synchronously on the connection's task and answers through
    /// [`Exchange::respond`]. A hook that returns without responding produces a
    /// `500 Internal Server Error`.
    ///
    /// This method runs until the process is terminated.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(&mut dyn Exchange) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "nestor listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: we loop, reading one
/// request per iteration, until the peer closes the connection or signals
/// `Connection: close`.
async fn handle_connection<H>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
) -> Result<(), std::io::Error>
where
    H: Fn(&mut dyn Exchange) + Send + Sync + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        // Only read when the buffer holds no complete pipelined request. A successful
        // parse guarantees the body offset plus Content-Length does not overflow.
        let (request, body_offset) = match Request::parse(&buf) {
            Ok((request, _)) if request.content_length() > MAX_REQUEST_SIZE => {
                warn!(
                    peer = %peer_addr,
                    content_length = request.content_length(),
                    "declared body too large — sending 413"
                );
                let response = Response::new(StatusCode::PayloadTooLarge)
                    .body("Request entity too large")
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
            Ok(pair) if buf.len() >= pair.1 + pair.0.content_length() => pair,
            Ok(_) | Err(RequestError::Incomplete) => {
                if stream.read_buf(&mut buf).await? == 0 {
                    debug!(peer = %peer_addr, "connection closed by peer");
                    break;
                }
                if buf.len() > MAX_REQUEST_SIZE {
                    warn!(peer = %peer_addr, "request too large — sending 413");
                    let response = Response::new(StatusCode::PayloadTooLarge)
                        .body("Request entity too large")
                        .keep_alive(false);
                    stream.write_all(&response.into_bytes()).await?;
                    break;
                }
                continue;
            }
            Err(RequestError::Method(e)) => {
                warn!(peer = %peer_addr, error = %e, "unsupported method — sending 501");
                let response = Response::new(StatusCode::NotImplemented)
                    .body(e.to_string())
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request — sending 400");
                let response = Response::new(StatusCode::BadRequest)
                    .body(format!("Bad Request: {e}"))
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
        };

        let total_needed = body_offset + request.content_length();
        let keep_alive = request.is_keep_alive();

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            target = %request.target(),
            "dispatching request"
        );

        let mut exchange = HttpExchange::new(request);
        handler(&mut exchange);

        let response = exchange.into_response().unwrap_or_else(|| {
            error!(peer = %peer_addr, "handler returned without responding — sending 500");
            Response::new(StatusCode::InternalServerError).body("Internal Server Error")
        });
        stream
            .write_all(&response.keep_alive(keep_alive).into_bytes())
            .await?;
        stream.flush().await?;

        // Drop the consumed request bytes from the buffer.
        let _ = buf.split_to(total_needed);

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close — shutting down");
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exchange_once(
        handler: impl Fn(&mut dyn Exchange) + Send + Sync + 'static,
        raw: &[u8],
    ) -> String {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        tokio::spawn(server.run(handler));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn bind_reports_local_addr() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let err = Server::bind("definitely not an address").await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[tokio::test]
    async fn silent_handler_yields_500() {
        let text = exchange_once(
            |_ex: &mut dyn Exchange| {},
            b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(text.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[tokio::test]
    async fn unsupported_method_yields_501() {
        let text = exchange_once(
            |ex: &mut dyn Exchange| ex.respond_text(StatusCode::Ok, "unreachable"),
            b"PATCH / HTTP/1.1\r\n\r\n",
        )
        .await;
        assert!(text.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
        assert!(!text.contains("unreachable"));
    }

    #[tokio::test]
    async fn malformed_request_yields_400() {
        let text = exchange_once(
            |ex: &mut dyn Exchange| ex.respond_text(StatusCode::Ok, "unreachable"),
            b"GET / HTTP/1.1\r\nBad Header\r\n\r\n",
        )
        .await;
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn oversized_content_length_yields_413() {
        let text = exchange_once(
            |ex: &mut dyn Exchange| ex.respond_text(StatusCode::Ok, "unreachable"),
            b"POST / HTTP/1.1\r\nContent-Length: 1000000000000\r\n\r\n",
        )
        .await;
        assert!(text.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn overflowing_content_length_yields_400() {
        let text = exchange_once(
            |ex: &mut dyn Exchange| ex.respond_text(StatusCode::Ok, "unreachable"),
            b"POST / HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\n",
        )
        .await;
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn handler_reads_request_body() {
        let text = exchange_once(
            |ex: &mut dyn Exchange| {
                let echoed = String::from_utf8_lossy(ex.body()).into_owned();
                ex.respond_text(StatusCode::Ok, &echoed);
            },
            b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        )
        .await;
        assert!(text.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn body_is_awaited_before_dispatch() {
        let text = exchange_once(
            |ex: &mut dyn Exchange| {
                let url = ex.url().to_owned();
                ex.respond_text(StatusCode::Created, &url);
            },
            b"POST /items?x=1 HTTP/1.1\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbody",
        )
        .await;
        assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(text.ends_with("\r\n\r\n/items?x=1"));
    }
}
