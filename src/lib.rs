//! # nestor
//!
//! An HTTP request router with named path parameters and nested sub-routers.
//!
//! A [`Router`] maps `(method, pattern)` pairs to handlers and can mount other routers
//! under a path prefix. Dispatch is synchronous: it picks exactly one handler (or the
//! not-found fallback) and calls it with the request descriptor and a flat [`Params`]
//! map of path captures and query pairs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nestor::server::Server;
//! use nestor::{Router, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut users = Router::new();
//!     users.get("/:id", |ex, params| {
//!         let body = format!("user {}", params.get("id").unwrap_or("?"));
//!         ex.respond_text(StatusCode::Ok, &body);
//!     })?;
//!
//!     let mut router = Router::new();
//!     router.get("/", |ex, _| ex.respond_text(StatusCode::Ok, "Hello, World!"))?;
//!     router.mount("/users", users)?;
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     println!("Listening on http://127.0.0.1:8080");
//!     server.run(router.listen()).await?;
//!     Ok(())
//! }
//! ```

// ── Routing core ──────────────────────────────────────────────────────────────
pub mod router;

// ── Transport adapter ─────────────────────────────────────────────────────────
pub mod http;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Exchange, Method, Response, StatusCode};
pub use router::{Handler, Params, RouteError, Router, RouterConfig};
pub use server::{Server, ServerError};
