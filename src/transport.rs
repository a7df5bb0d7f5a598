//! Transport seam between the workflow core and the network. The core only
//! ever sees `WireRequest`/`WireResponse`; retry or backoff policy can be
//! layered into a `Transport` implementation without touching workflow logic.

use bytes::Bytes;
use reqwest::{Client, Method, StatusCode};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub enum WireBody {
    Empty,
    Json(serde_json::Value),
    Bytes(Bytes),
}

#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: WireBody,
}

#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl WireResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: WireRequest,
    ) -> impl Future<Output = Result<WireResponse, TransportError>> + Send;
}

/// One-shot timer capability. Production sleeps on the tokio timer; tests
/// substitute an instant clock that records requested durations.
pub trait Delay: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .expect("failed to build reqwest client");
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: WireRequest,
    ) -> impl Future<Output = Result<WireResponse, TransportError>> + Send {
        let client = self.client.clone();
        async move {
            let mut builder = client.request(request.method, request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(*name, value);
            }
            builder = match request.body {
                WireBody::Empty => builder,
                WireBody::Json(value) => builder.json(&value),
                WireBody::Bytes(bytes) => builder.body(bytes),
            };
            let response = builder.send().await?;
            let status = response.status();
            let headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        String::from_utf8_lossy(value.as_bytes()).to_string(),
                    )
                })
                .collect();
            let body = response.bytes().await?;
            Ok(WireResponse {
                status,
                headers,
                body,
            })
        }
    }
}

pub struct TokioDelay;

impl Delay for TokioDelay {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Cancellation signal threaded through the poller so a caller can abort an
/// in-flight analysis between suspension points.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling; this invocation can
                // never be cancelled, so park forever.
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = WireResponse {
            status: StatusCode::OK,
            headers: vec![("X-Goog-Upload-URL".to_string(), "https://u".to_string())],
            body: Bytes::new(),
        };
        assert_eq!(response.header("x-goog-upload-url"), Some("https://u"));
        assert_eq!(response.header("missing"), None);
    }

    #[tokio::test]
    async fn token_observes_cancellation() {
        let (handle, token) = cancel_pair();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
        token.cancelled().await;
    }
}
