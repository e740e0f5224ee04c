//! HTTP client configuration and error classification
//!
//! Builds the `reqwest` clients used to reach the fetch collaborator and to
//! download documents, and maps collaborator status codes onto failures that
//! need user action.

use reqwest::Client;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Fetch collaborator configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Collaborator API key
    pub api_key: Option<String>,
    /// API base URL (default: https://api.firecrawl.dev)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient failures (connection errors, 5xx other than 504)
    pub max_retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.firecrawl.dev".to_string(),
            timeout_secs: 45,
            max_retries: 2,
        }
    }
}

impl FetchConfig {
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string()).filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Collaborator failures the caller has to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    InvalidCredential,
    InsufficientCredits,
    RateLimited,
    TimedOut,
}

impl FailureKind {
    /// Short label for the failure
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::InvalidCredential => "Invalid API key",
            FailureKind::InsufficientCredits => "Insufficient credits",
            FailureKind::RateLimited => "Rate limit exceeded",
            FailureKind::TimedOut => "Request timeout",
        }
    }

    /// What the user can do about it
    pub fn hint(&self) -> &'static str {
        match self {
            FailureKind::InvalidCredential => "Please check your Firecrawl API key is correct.",
            FailureKind::InsufficientCredits => {
                "You've run out of Firecrawl credits. Please upgrade your plan."
            }
            FailureKind::RateLimited => "Too many requests. Please wait a moment and try again.",
            FailureKind::TimedOut => "The deep search took too long. Try a more specific query.",
        }
    }

    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 => Some(FailureKind::InvalidCredential),
            402 => Some(FailureKind::InsufficientCredits),
            429 => Some(FailureKind::RateLimited),
            504 => Some(FailureKind::TimedOut),
            _ => None,
        }
    }
}

/// A classified collaborator failure with its status code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorFailure {
    pub kind: FailureKind,
    pub status: u16,
}

impl CollaboratorFailure {
    pub fn hint(&self) -> &'static str {
        self.kind.hint()
    }
}

impl fmt::Display for CollaboratorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.kind.label(), self.status, self.kind.hint())
    }
}

/// Errors from the fetch collaborator
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Fetch collaborator API key not configured")]
    MissingApiKey,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Collaborator returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Collaborator(CollaboratorFailure),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

impl FetchError {
    /// Classified collaborator failure, if this is one
    pub fn collaborator_failure(&self) -> Option<&CollaboratorFailure> {
        match self {
            FetchError::Collaborator(failure) => Some(failure),
            _ => None,
        }
    }

    /// Invalid credential, exhausted credits or rate limiting: retrying will not help
    pub fn requires_user_action(&self) -> bool {
        matches!(self, FetchError::MissingApiKey)
            || self.collaborator_failure().is_some_and(|f| {
                matches!(
                    f.kind,
                    FailureKind::InvalidCredential
                        | FailureKind::InsufficientCredits
                        | FailureKind::RateLimited
                )
            })
    }

    /// Worth another attempt (connection problems, 5xx other than 504)
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Request(e) => e.is_connect() || e.is_timeout(),
            FetchError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Map a non-success status and body onto a fetch error
pub fn classify_status(status: u16, message: &str) -> FetchError {
    match FailureKind::from_status(status) {
        Some(kind) => FetchError::Collaborator(CollaboratorFailure { kind, status }),
        None => FetchError::Status {
            status,
            message: message.chars().take(200).collect(),
        },
    }
}

/// User agents for document downloads
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0",
];

/// Get a random user agent
pub fn random_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// Client for collaborator API calls
pub fn create_api_client(config: &FetchConfig) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(concat!("fathom/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| FetchError::ClientBuild(e.to_string()))
}

/// Client for direct document downloads
pub fn create_download_client(config: &FetchConfig) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(random_user_agent())
        .build()
        .map_err(|e| FetchError::ClientBuild(e.to_string()))
}
