use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use thiserror::Error;

// Shared HTTP client with reasonable defaults for timeouts
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent("progresswatch/0.1")
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build HTTP client")
});

/// One decoded body of the status endpoint. The server reports percent
/// complete; the poller never validates bounds, anything >= 100 counts
/// as finished.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ProgressReading {
    pub progress: f64,
}

#[derive(Error, Debug)]
pub enum PollError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Server error: {0}")]
    Api(String),
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A source of progress readings plus the terminal results document.
///
/// The polling loop and both display frontends only talk to this trait,
/// so tests can script a sequence of readings without a server. The
/// methods return `Send` futures so implementations can be driven from a
/// spawned task; impls write plain `async fn`.
pub trait StatusEndpoint {
    fn fetch_progress(&self) -> impl Future<Output = Result<ProgressReading, PollError>> + Send;
    fn fetch_results(&self) -> impl Future<Output = Result<String, PollError>> + Send;
}

/// Production endpoint: `GET <base>/progress` and `GET <base>/results`.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    base: String,
}

impl HttpEndpoint {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn progress_url(&self) -> String {
        format!("{}/progress", self.base)
    }

    fn results_url(&self) -> String {
        format!("{}/results", self.base)
    }
}

impl StatusEndpoint for HttpEndpoint {
    async fn fetch_progress(&self) -> Result<ProgressReading, PollError> {
        let resp = HTTP_CLIENT.get(self.progress_url()).send().await?;

        if !resp.status().is_success() {
            return Err(PollError::Api(format!(
                "progress: HTTP {}",
                resp.status()
            )));
        }

        // Decode via serde_json so a malformed body is distinguishable
        // from a transport failure.
        let body = resp.text().await?;
        let reading: ProgressReading = serde_json::from_str(&body)?;
        Ok(reading)
    }

    async fn fetch_results(&self) -> Result<String, PollError> {
        let resp = HTTP_CLIENT.get(self.results_url()).send().await?;

        if !resp.status().is_success() {
            return Err(PollError::Api(format!(
                "results: HTTP {}",
                resp.status()
            )));
        }

        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls_trim_trailing_slash() {
        let ep = HttpEndpoint::new("http://localhost:5000/");
        assert_eq!(ep.progress_url(), "http://localhost:5000/progress");
        assert_eq!(ep.results_url(), "http://localhost:5000/results");
    }

    #[test]
    fn reading_decodes_bare_object() {
        let r: ProgressReading = serde_json::from_str(r#"{"progress": 57}"#).unwrap();
        assert_eq!(r.progress, 57.0);
    }

    #[test]
    fn reading_ignores_extra_fields() {
        let r: ProgressReading =
            serde_json::from_str(r#"{"progress": 12.5, "stage": "tokenize"}"#).unwrap();
        assert_eq!(r.progress, 12.5);
    }

    #[test]
    fn reading_rejects_missing_field() {
        let r: Result<ProgressReading, _> = serde_json::from_str(r#"{"percent": 10}"#);
        assert!(r.is_err());
    }

    #[test]
    fn malformed_body_maps_to_serde_error() {
        let err = serde_json::from_str::<ProgressReading>("<html>oops</html>")
            .map_err(PollError::from)
            .unwrap_err();
        assert!(matches!(err, PollError::Serde(_)));
    }
}
