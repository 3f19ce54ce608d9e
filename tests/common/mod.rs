//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// The parts of an incoming request a handler can inspect.
#[derive(Debug, Clone, Default)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A canned reply.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Start a mock backend on an ephemeral port; `f` decides each reply.
pub async fn start_programmable_backend<F>(f: F) -> SocketAddr
where
    F: Fn(&RequestHead) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let head = parse_head(&String::from_utf8_lossy(&buf));
                let reply = f(&head);

                let mut response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                    reply.status,
                    status_text(reply.status),
                    reply.body.len()
                );
                for (k, v) in &reply.headers {
                    response.push_str(&format!("{}: {}\r\n", k, v));
                }
                response.push_str("\r\n");
                response.push_str(&reply.body);

                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a mock backend that always answers with `content_type` and `body`.
#[allow(dead_code)]
pub async fn start_mock_backend(content_type: &'static str, body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| {
        Reply::new(200, body).header("Content-Type", content_type)
    })
    .await
}

/// Start a backend that promises a longer JSON body than it sends, then closes.
#[allow(dead_code)]
pub async fn start_truncated_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut chunk = [0u8; 4096];
                let _ = socket.read(&mut chunk).await;
                let response = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\nConnection: close\r\n\r\n{\"ok\"";
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

fn parse_head(raw: &str) -> RequestHead {
    let mut lines = raw.split("\r\n");
    let mut head = RequestHead::default();

    if let Some(request_line) = lines.next() {
        let mut parts = request_line.split_whitespace();
        head.method = parts.next().unwrap_or_default().to_string();
        head.path = parts.next().unwrap_or_default().to_string();
    }
    for line in lines.take_while(|l| !l.is_empty()) {
        if let Some((k, v)) = line.split_once(':') {
            head.headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }
    head
}
