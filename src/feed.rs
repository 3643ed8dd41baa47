//! Time-boxed JSON feed fetching.
//!
//! One HTTP GET per call, a caller-specified timeout, and outcomes settled
//! as values: the caller observes success, timeout, HTTP, or parse failure
//! through `FetchOutcome`, never through a panic or an escaped transport
//! error. Each call reports loading/error status to the shared status bar
//! keyed by the descriptor id.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::errors::{FeedFailure, QuakeError};
use crate::status::{SharedStatusBar, StatusBar};

/// Default request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("quakescope/", env!("CARGO_PKG_VERSION"));

/// USGS base URL for event and catalog feeds.
pub const USGS_BASE_URL: &str = "https://earthquake.usgs.gov";

/// Describes one feed request on behalf of a feature.
#[derive(Debug, Clone)]
pub struct FeedDescriptor {
    /// Feature id the status entry is keyed by
    pub id: String,
    /// Display label used in the loading message
    pub name: String,
    pub url: String,
    /// When set, a 404/409 response is reported as "Event ID ... not found"
    /// instead of the raw HTTP status line.
    pub not_found_hint: Option<String>,
}

impl FeedDescriptor {
    #[must_use]
    pub fn new(id: &str, name: &str, url: String) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            url,
            not_found_hint: None,
        }
    }

    #[must_use]
    pub fn with_not_found_hint(mut self, hint: &str) -> Self {
        self.not_found_hint = Some(hint.to_string());
        self
    }

    /// Host portion of the url, for timeout messages.
    #[must_use]
    pub fn host(&self) -> &str {
        host_of(&self.url)
    }
}

/// Per-request options.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Settled result of one fetch.
pub type FetchOutcome = Result<Value, FeedFailure>;

/// Boxed future returned by `FeedSource::fetch_json`.
pub type FetchFuture = Pin<Box<dyn Future<Output = FetchOutcome> + Send + 'static>>;

/// The fetch seam the orchestrator schedules against.
///
/// Production uses `JsonFeed`; tests substitute scripted outcomes.
pub trait FeedSource: Send + Sync {
    fn fetch_json(&self, desc: FeedDescriptor, opts: FetchOptions) -> FetchFuture;
}

/// Production feed source backed by reqwest.
pub struct JsonFeed {
    client: reqwest::Client,
    status: SharedStatusBar,
}

impl JsonFeed {
    /// Create a new feed source reporting into `status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(status: SharedStatusBar) -> Result<Self, QuakeError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, status })
    }
}

impl FeedSource for JsonFeed {
    fn fetch_json(&self, desc: FeedDescriptor, opts: FetchOptions) -> FetchFuture {
        let client = self.client.clone();
        let status = Arc::clone(&self.status);
        Box::pin(async move {
            with_status(&status, |bar| {
                bar.add_item(&desc.id, &format!("Loading {}", desc.name));
            });

            debug!("fetching {} from {}", desc.id, desc.url);
            let outcome = perform(&client, &desc, opts).await;

            match &outcome {
                Ok(_) => with_status(&status, |bar| bar.remove_item(&desc.id)),
                Err(failure) => {
                    let message = failure.message.clone();
                    with_status(&status, |bar| bar.add_error(&desc.id, &message));
                }
            }
            outcome
        })
    }
}

async fn perform(
    client: &reqwest::Client,
    desc: &FeedDescriptor,
    opts: FetchOptions,
) -> FetchOutcome {
    let request = client.get(&desc.url).timeout(opts.timeout).send();

    let response = match tokio::time::timeout(opts.timeout, request).await {
        // outer box elapsed
        Err(_) => return Err(FeedFailure::timeout(desc.host())),
        // transport-level failures all read as "could not be reached"
        Ok(Err(_)) => return Err(FeedFailure::timeout(desc.host())),
        Ok(Ok(response)) => response,
    };

    let status = response.status();
    if !status.is_success() {
        return Err(classify_http(status.as_u16(), desc));
    }

    match response.json::<Value>().await {
        Ok(value) => Ok(value),
        Err(e) => Err(FeedFailure::parse(&e.to_string())),
    }
}

/// Map a non-success status to a feed failure, substituting the friendly
/// not-found wording when the descriptor asks for it.
fn classify_http(status: u16, desc: &FeedDescriptor) -> FeedFailure {
    if matches!(status, 404 | 409) {
        if let Some(hint) = &desc.not_found_hint {
            return FeedFailure {
                kind: crate::errors::FailureKind::Http(status),
                message: format!("Event ID {hint} not found"),
            };
        }
    }
    FeedFailure::http(status, reason_phrase(status))
}

fn reason_phrase(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("error")
}

fn host_of(url: &str) -> &str {
    let rest = url.split("://").nth(1).unwrap_or(url);
    rest.split('/').next().unwrap_or(rest)
}

fn with_status(status: &SharedStatusBar, f: impl FnOnce(&mut StatusBar)) {
    if let Ok(mut bar) = status.lock() {
        f(&mut bar);
    }
}
