//! Oncology system transport.
//!
//! The pharmacy exchanges FHIR `MedicationRequest` resources with an external
//! oncology system over two channels:
//! - a synchronous HTTP request/response cycle for full syncs and status
//!   pushes ([`client::OncologyClient`])
//! - a long-lived WebSocket delivering unsolicited update and cancellation
//!   events ([`subscribe::subscribe`])
//!
//! Every HTTP request carries a static bearer token and an explicit timeout;
//! a hung remote fails the one request instead of blocking the caller
//! indefinitely. Nothing here retries automatically — recovery is the caller
//! re-invoking the operation — and a dropped socket is reported, not
//! silently reconnected.

pub mod client;
pub mod subscribe;

pub use client::OncologyClient;
pub use subscribe::{subscribe, OncologyEvent};

use std::time::Duration;

/// Default per-request timeout for HTTP calls to the oncology system.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors returned by the oncology transport.
#[derive(Debug, thiserror::Error)]
pub enum OncologyError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("oncology system returned {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Fhir(#[from] fhir::FhirError),
}

/// Type alias for Results that can fail with an [`OncologyError`].
pub type OncologyResult<T> = Result<T, OncologyError>;

/// Connection settings for the oncology system, resolved once at startup.
#[derive(Clone, Debug)]
pub struct OncologyConfig {
    base_url: String,
    api_token: String,
    request_timeout: Duration,
}

impl OncologyConfig {
    /// Create a new `OncologyConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`OncologyError::InvalidConfig`] if the base URL is empty.
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        request_timeout: Duration,
    ) -> OncologyResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(OncologyError::InvalidConfig(
                "oncology base URL must not be empty".into(),
            ));
        }

        Ok(Self {
            base_url,
            api_token: api_token.into(),
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// The WebSocket endpoint derived from the base URL, mirroring the
    /// `https → wss` rewrite the update stream expects.
    pub fn updates_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}/updates")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_normalises_trailing_slash() {
        let config = OncologyConfig::new(
            "https://oncology-api.example.com/fhir/",
            "token",
            DEFAULT_REQUEST_TIMEOUT,
        )
        .unwrap();
        assert_eq!(config.base_url(), "https://oncology-api.example.com/fhir");
    }

    #[test]
    fn config_rejects_empty_base_url() {
        assert!(OncologyConfig::new("  ", "token", DEFAULT_REQUEST_TIMEOUT).is_err());
    }

    #[test]
    fn updates_url_switches_scheme() {
        let secure = OncologyConfig::new(
            "https://oncology-api.example.com/fhir",
            "token",
            DEFAULT_REQUEST_TIMEOUT,
        )
        .unwrap();
        assert_eq!(
            secure.updates_url(),
            "wss://oncology-api.example.com/fhir/updates"
        );

        let plain =
            OncologyConfig::new("http://localhost:8090/fhir", "token", DEFAULT_REQUEST_TIMEOUT)
                .unwrap();
        assert_eq!(plain.updates_url(), "ws://localhost:8090/fhir/updates");
    }
}
