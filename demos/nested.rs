//! A root router with a nested `/custom` router, served over TCP.
//!
//! ```text
//! cargo run --example nested
//! curl localhost:8080/test
//! curl localhost:8080/custom/router
//! curl 'localhost:8080/custom/items/7?verbose=1'
//! ```

use nestor::server::Server;
use nestor::{Response, Router, StatusCode};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,nestor=debug")),
        )
        .init();

    let mut custom = Router::new();
    custom.get("router", |ex, _| {
        info!("got to custom route");
        ex.respond_text(StatusCode::Ok, "Custom Route GET");
    })?;
    custom.get("/items/:id", |ex, params| match Response::json(params) {
        Ok(response) => ex.respond(response),
        Err(e) => ex.respond_text(StatusCode::InternalServerError, &e.to_string()),
    })?;

    let mut router = Router::new();
    router.mount("custom", custom)?;
    router.get("test", |ex, _| ex.respond_text(StatusCode::Ok, "Test route GET"))?;

    let server = Server::bind("127.0.0.1:8080").await?;
    server.run(router.listen()).await?;
    Ok(())
}
