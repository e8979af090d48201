use std::net::SocketAddr;

use nestor::server::Server;
use nestor::{Response, Router, RouterConfig, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn app() -> Router {
    let mut widgets = Router::new();
    widgets
        .get("/:id", |ex, params| match Response::json(params) {
            Ok(response) => ex.respond(response),
            Err(e) => ex.respond_text(StatusCode::InternalServerError, &e.to_string()),
        })
        .unwrap();
    widgets
        .post("/", |ex, _| ex.respond_text(StatusCode::Created, "created"))
        .unwrap();

    let mut api = Router::with_config(
        RouterConfig::new().not_found(|ex, _| ex.respond_text(StatusCode::NotFound, "no such api")),
    );
    api.mount("/widgets", widgets).unwrap();

    let mut root = Router::new();
    root.get("/", |ex, _| ex.respond_text(StatusCode::Ok, "home"))
        .unwrap();
    root.mount("/api", api).unwrap();
    root
}

async fn start() -> SocketAddr {
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.run(app().listen()));
    addr
}

async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn serves_root_route() {
    let addr = start().await;
    let text = roundtrip(addr, "GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.ends_with("\r\n\r\nhome"));
}

#[tokio::test]
async fn nested_route_returns_params_as_json() {
    let addr = start().await;
    let text = roundtrip(
        addr,
        "GET /api/widgets/42 HTTP/1.1\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Content-Type: application/json\r\n"));
    assert!(text.ends_with(r#"{"id":"42"}"#));
}

#[tokio::test]
async fn post_to_mounted_root() {
    let addr = start().await;
    let text = roundtrip(
        addr,
        "POST /api/widgets HTTP/1.1\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}",
    )
    .await;
    assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
}

#[tokio::test]
async fn not_found_comes_from_deepest_router() {
    let addr = start().await;
    let api = roundtrip(addr, "GET /api/gadgets HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert!(api.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(api.ends_with("no such api"));

    let root = roundtrip(addr, "GET /nowhere HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert!(root.ends_with("\r\n\r\nNot Found"));
}

#[tokio::test]
async fn keep_alive_serves_pipelined_requests() {
    let addr = start().await;
    let text = roundtrip(
        addr,
        "GET / HTTP/1.1\r\n\r\nDELETE /api/widgets/1 HTTP/1.1\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(text.matches("HTTP/1.1 ").count(), 2);
    assert!(text.contains("\r\n\r\nhome"));
    // DELETE is not bound on the widget pattern.
    assert!(text.contains("HTTP/1.1 404 Not Found\r\n"));
}
