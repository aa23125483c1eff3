//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use rest_bridge::config::BridgeConfig;
use rest_bridge::forward::{ForwardError, Forwarded, Forwarder};
use rest_bridge::gate::{DecodedEvent, Gate, RequestContext, SignedQuery, VerificationConfig};
use rest_bridge::http::{BridgeServer, TransportSecurity};

/// How a [`RecordingForwarder`] answers.
#[derive(Clone, Copy)]
#[allow(dead_code)]
pub enum Reply {
    Immediate,
    Deferred,
    DeferredFailure,
    Panic,
}

/// Forwarder that remembers every event it was handed.
pub struct RecordingForwarder {
    reply: Reply,
    pub events: Mutex<Vec<DecodedEvent>>,
}

impl RecordingForwarder {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            events: Mutex::new(Vec::new()),
        })
    }

    #[allow(dead_code)]
    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl Forwarder for RecordingForwarder {
    fn forward(&self, _ctx: &RequestContext, event: DecodedEvent) -> Result<Forwarded, ForwardError> {
        let body = Bytes::from(serde_json::to_vec(&event)?);
        self.events.lock().unwrap().push(event);
        Ok(match self.reply {
            Reply::Immediate => Forwarded::Immediate(body),
            Reply::Deferred => Forwarded::Pending(Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(body)
            })),
            Reply::DeferredFailure => {
                Forwarded::Pending(Box::pin(async { Err(ForwardError::Other("router went away".into())) }))
            }
            Reply::Panic => panic!("forwarder crashed"),
        })
    }
}

/// Mount one gate at `path` and return the router's server.
pub fn server_with(path: &str, config: VerificationConfig, forwarder: Arc<RecordingForwarder>) -> BridgeServer {
    BridgeServer::with_gates(BridgeConfig::default(), vec![(path.to_string(), Gate::new(config, forwarder))])
}

/// A JSON POST as the HTTP layer would see it from `client`.
pub fn post(uri: &str, body: impl Into<Bytes>, client: &str) -> Request<Body> {
    let body = body.into();
    let mut request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();
    connect_from(&mut request, client);
    request
}

/// Attach the peer address the listener would have recorded.
pub fn connect_from(request: &mut Request<Body>, client: &str) {
    let addr: SocketAddr = client.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request.extensions_mut().insert(TransportSecurity::default());
}

/// `path?<signed query>` for `body`, signed now.
pub fn signed_uri(path: &str, key: &str, secret: &str, body: &str) -> String {
    let signed = SignedQuery::new(key, secret.as_bytes(), 1, 42, body.as_bytes(), chrono::Utc::now());
    format!("{}?{}", path, signed.to_query_string())
}

pub async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Start a mock upstream that answers every request with `status` and `body`.
///
/// Each received request (head and body) is sent on the returned channel.
#[allow(dead_code)]
pub async fn start_mock_upstream(
    status: &'static str,
    body: &'static str,
) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                let _ = tx.send(request);
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&data).into_owned();
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            if data.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}
