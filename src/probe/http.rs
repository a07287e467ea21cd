//! HTTP endpoint prober.
//!
//! Issues one GET per target and reports whether a response arrived.

use std::time::Duration;

use reqwest::Client;
use tokio::time::timeout;

use super::target::ParsedTarget;
use super::traits::{ProbeError, Prober};

/// Default request timeout (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("extmon/", env!("CARGO_PKG_VERSION"));

/// Prober backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
}

impl HttpProber {
    /// Create a prober whose every request is bounded by `timeout`.
    ///
    /// # Errors
    /// Returns `ProbeError::Build` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProbeError::Build(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(&self, err: reqwest::Error) -> ProbeError {
        if err.is_timeout() {
            ProbeError::Timeout(self.timeout)
        } else if err.is_connect() {
            ProbeError::Connect(error_chain(&err))
        } else {
            ProbeError::Transport(error_chain(&err))
        }
    }
}

impl std::fmt::Debug for HttpProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProber")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn fetch(&self, target: &ParsedTarget) -> Result<u16, ProbeError> {
        let request = self
            .client
            .get(target.url().clone())
            .build()
            .map_err(|e| ProbeError::Build(error_chain(&e)))?;

        // DNS resolution can stall before the client timeout is armed.
        match timeout(self.timeout, self.client.execute(request)).await {
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                // Dropping an unread response closes the connection.
                drop(response);
                Ok(status)
            }
            Ok(Err(e)) => Err(self.classify(e)),
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}

/// Render an error with its source chain, since `reqwest` keeps the useful
/// part (e.g. "Connection refused") in the sources.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use axum::{Router, http::StatusCode, routing::get};
    use std::io::ErrorKind;
    use tokio::net::TcpListener;

    async fn bind_local() -> Option<TcpListener> {
        match TcpListener::bind("127.0.0.1:0").await {
            Ok(l) => Some(l),
            // Some sandboxed environments disallow binding; skip the test.
            Err(e) if e.kind() == ErrorKind::PermissionDenied => None,
            Err(e) => panic!("Failed to bind test listener: {e}"),
        }
    }

    async fn start_target_server() -> Option<String> {
        let listener = bind_local().await?;
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route(
                "/unavailable",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
            );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Some(format!("http://{}", addr))
    }

    #[tokio::test]
    async fn test_http_prober_success() {
        let Some(base) = start_target_server().await else {
            return;
        };
        let prober = HttpProber::new(Duration::from_secs(2)).unwrap();

        let outcome = prober.probe(&format!("{}/", base)).await.unwrap();
        match outcome {
            ProbeOutcome::Success { status, label, .. } => {
                assert_eq!(status, 200);
                assert_eq!(label, "_");
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_prober_non_2xx_is_success() {
        let Some(base) = start_target_server().await else {
            return;
        };
        let prober = HttpProber::new(Duration::from_secs(2)).unwrap();

        let outcome = prober
            .probe(&format!("{}/unavailable", base))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ProbeOutcome::Success { status: 503, .. }
        ));
    }

    #[tokio::test]
    async fn test_http_prober_connection_refused() {
        // Bind then drop to find a port with no listener.
        let Some(listener) = bind_local().await else {
            return;
        };
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = HttpProber::new(Duration::from_secs(2)).unwrap();
        let outcome = prober.probe(&format!("http://{}/", addr)).await.unwrap();
        match outcome {
            ProbeOutcome::Failure {
                elapsed_ms, error, ..
            } => {
                assert!(elapsed_ms.is_some());
                assert!(
                    matches!(error, ProbeError::Connect(_)),
                    "unexpected error: {error:?}"
                );
            }
            other => panic!("expected Failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_prober_timeout() {
        // Accept connections but never answer.
        let Some(listener) = bind_local().await else {
            return;
        };
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let prober = HttpProber::new(Duration::from_millis(200)).unwrap();
        let outcome = prober.probe(&format!("http://{}/", addr)).await.unwrap();
        match outcome {
            ProbeOutcome::Failure {
                elapsed_ms, error, ..
            } => {
                assert_eq!(error, ProbeError::Timeout(Duration::from_millis(200)));
                assert!(elapsed_ms.unwrap() >= 150.0);
            }
            other => panic!("expected Failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_prober_rejects_malformed_target() {
        let prober = HttpProber::new(DEFAULT_TIMEOUT).unwrap();
        assert!(matches!(
            prober.probe("not a url").await,
            Some(ProbeOutcome::Invalid(_))
        ));
        assert!(prober.probe("\r").await.is_none());
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let inner = std::io::Error::new(ErrorKind::ConnectionRefused, "Connection refused");
        let outer = std::io::Error::new(ErrorKind::Other, inner);
        // io::Error wrapping another error displays the inner message.
        assert!(error_chain(&outer).contains("Connection refused"));
    }
}
