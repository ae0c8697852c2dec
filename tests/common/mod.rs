//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::StatusCode;
use request_governor::{RequestOptions, Response, Transport, TransportError};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

type Responder = dyn Fn(&str, &RequestOptions, usize) -> Result<Response, TransportError> + Send + Sync;

/// In-memory transport that answers from a closure and counts calls.
///
/// The closure gets the URL and the zero-based call index; closures given to
/// `from_request` also see the request options.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    delay: Duration,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, usize) -> Result<Response, TransportError> + Send + Sync + 'static,
    {
        Self::from_request(move |url, _, n| responder(url, n))
    }

    pub fn from_request<F>(responder: F) -> Self
    where
        F: Fn(&str, &RequestOptions, usize) -> Result<Response, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Every call answers `status`, with the call index in the body.
    pub fn always(status: u16) -> Self {
        Self::new(move |_, n| reply(status, format!("response {n}")))
    }

    /// Every call answers 200 with the request body echoed back.
    pub fn echo_body() -> Self {
        Self::from_request(|_, options, _| {
            let body = options.body.as_deref().unwrap_or_default();
            reply(200, String::from_utf8_lossy(body))
        })
    }

    /// Every call answers 200 naming the caller by its `Cookie` or
    /// `Authorization` header.
    pub fn echo_caller() -> Self {
        Self::from_request(|_, options, n| {
            let caller = ["cookie", "authorization"]
                .iter()
                .find_map(|name| options.headers.get(*name))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("anonymous");
            reply(200, format!("{caller} #{n}"))
        })
    }

    /// Each call takes `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, url: &str, options: RequestOptions) -> Result<Response, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.responder)(url, &options, n)
    }
}

pub fn reply(status: u16, body: impl Into<String>) -> Result<Response, TransportError> {
    Ok(Response::new(
        StatusCode::from_u16(status).unwrap(),
        body.into(),
    ))
}

/// Start a programmable HTTP backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let path = match read_request_path(&mut socket).await {
                    Some(path) => path,
                    None => return,
                };
                let (status, body) = f(path).await;
                let status_text = match status {
                    200 => "200 OK",
                    404 => "404 Not Found",
                    429 => "429 Too Many Requests",
                    500 => "500 Internal Server Error",
                    502 => "502 Bad Gateway",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Read a bodiless request head and return its request-target.
async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    head.lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
}
