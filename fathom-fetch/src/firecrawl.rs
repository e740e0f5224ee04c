//! Fetch/search collaborator
//!
//! [`WebFetcher`] is the seam the research pipeline talks to: broad web search,
//! single-page scraping (markdown + html) and PDF text extraction.
//! [`FirecrawlClient`] implements it against the Firecrawl v1 HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use fathom_core::Metadata;

use crate::{
    classify_status, create_api_client, create_download_client, download_pdf_text, FetchConfig,
    FetchError,
};

/// Options for a collaborator search
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Maximum number of hits
    pub limit: usize,
    /// Output formats for hit content (e.g. "markdown")
    pub formats: Vec<String>,
    pub only_main_content: bool,
    /// Scrape each hit's page content, or return titles/descriptions only
    pub fetch_content: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            limit: 10,
            formats: vec!["markdown".to_string()],
            only_main_content: true,
            fetch_content: true,
        }
    }
}

impl SearchRequest {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Titles and URLs only
    pub fn links_only(mut self) -> Self {
        self.fetch_content = false;
        self
    }
}

/// Options for a single-page scrape
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub formats: Vec<String>,
    pub only_main_content: bool,
    /// Milliseconds to wait for dynamic content
    pub wait_for_ms: u64,
    /// Tags to keep even outside the main content
    pub include_tags: Vec<String>,
}

impl Default for ScrapeRequest {
    fn default() -> Self {
        Self {
            formats: vec!["markdown".to_string(), "html".to_string()],
            only_main_content: true,
            wait_for_ms: 2000,
            include_tags: ["table", "figure", "data", "stats"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

/// One search hit
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub description: String,
    /// Markdown content when requested, otherwise empty
    pub markdown: String,
    /// Collaborator relevance score, if it reports one
    pub score: Option<f64>,
    pub metadata: Metadata,
}

impl SearchHit {
    /// Markdown if present, description otherwise
    pub fn content(&self) -> &str {
        if self.markdown.trim().is_empty() {
            &self.description
        } else {
            &self.markdown
        }
    }
}

/// One scraped page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedPage {
    pub url: String,
    pub title: Option<String>,
    pub markdown: String,
    pub html: String,
    pub metadata: Metadata,
}

/// Fetch/search capability consumed by strategies, crawler and orchestrator
#[async_trait]
pub trait WebFetcher: Send + Sync {
    /// Fail fast when the collaborator cannot be used at all (e.g. missing credential)
    fn ensure_ready(&self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Web search; `Ok(vec![])` means zero results, never failure
    async fn search(&self, query: &str, request: &SearchRequest)
        -> Result<Vec<SearchHit>, FetchError>;

    /// Scrape one page
    async fn scrape(&self, url: &str, request: &ScrapeRequest) -> Result<ScrapedPage, FetchError>;

    /// Download a PDF and extract its text
    async fn fetch_pdf_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Thread-safe reference to a fetcher
pub type SharedFetcher = Arc<dyn WebFetcher>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeOptionsBody<'a> {
    formats: &'a [String],
    only_main_content: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    query: &'a str,
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    scrape_options: Option<ScrapeOptionsBody<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeBody<'a> {
    url: &'a str,
    formats: &'a [String],
    only_main_content: bool,
    wait_for: u64,
    include_tags: &'a [String],
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<SearchItem>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    markdown: Option<String>,
    content: Option<String>,
    score: Option<f64>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
    content: Option<String>,
    html: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

/// Firecrawl-backed fetcher
pub struct FirecrawlClient {
    config: FetchConfig,
    api: Client,
    downloads: Client,
}

impl FirecrawlClient {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let api = create_api_client(&config)?;
        let downloads = create_download_client(&config)?;
        Ok(Self {
            config,
            api,
            downloads,
        })
    }

    pub fn shared(self) -> SharedFetcher {
        Arc::new(self)
    }

    fn api_key(&self) -> Result<&str, FetchError> {
        self.config
            .api_key
            .as_deref()
            .ok_or(FetchError::MissingApiKey)
    }

    /// POST a JSON body, retrying transient failures with linear backoff
    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<String, FetchError> {
        let api_key = self.api_key()?;
        let url = format!("{}{}", self.config.base_url, path);
        let mut attempt = 0;

        loop {
            let outcome = async {
                let response = self
                    .api
                    .post(&url)
                    .bearer_auth(api_key)
                    .json(body)
                    .send()
                    .await?;

                let status = response.status();
                let text = response.text().await?;
                if status.is_success() {
                    Ok(text)
                } else {
                    Err(classify_status(status.as_u16(), &text))
                }
            }
            .await;

            match outcome {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!("Retrying {} (attempt {}): {}", path, attempt, e);
                    tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                }
                Err(FetchError::Request(e)) if e.is_timeout() => {
                    return Err(FetchError::Timeout(self.config.timeout_secs));
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl WebFetcher for FirecrawlClient {
    fn ensure_ready(&self) -> Result<(), FetchError> {
        self.api_key().map(|_| ())
    }

    async fn search(
        &self,
        query: &str,
        request: &SearchRequest,
    ) -> Result<Vec<SearchHit>, FetchError> {
        debug!("Searching (limit {}): {}", request.limit, query);

        let body = SearchBody {
            query,
            limit: request.limit,
            scrape_options: request.fetch_content.then_some(ScrapeOptionsBody {
                formats: &request.formats,
                only_main_content: request.only_main_content,
            }),
        };

        let raw = self.post_json("/v1/search", &body).await?;
        let response: SearchResponse =
            serde_json::from_str(&raw).map_err(|e| FetchError::Parse(e.to_string()))?;

        if !response.success {
            return Err(FetchError::Status {
                status: 200,
                message: response.error.unwrap_or_else(|| "search failed".to_string()),
            });
        }

        let hits: Vec<SearchHit> = response
            .data
            .into_iter()
            .filter_map(|item| {
                let url = item.url?;
                let title = item
                    .title
                    .or_else(|| {
                        item.metadata
                            .get("title")
                            .and_then(|v| v.as_str())
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| url.clone());
                Some(SearchHit {
                    title,
                    description: item.description.unwrap_or_default(),
                    markdown: item.markdown.or(item.content).unwrap_or_default(),
                    score: item.score,
                    metadata: item.metadata,
                    url,
                })
            })
            .collect();

        debug!("Search returned {} hits", hits.len());
        Ok(hits)
    }

    async fn scrape(&self, url: &str, request: &ScrapeRequest) -> Result<ScrapedPage, FetchError> {
        debug!("Scraping: {}", url);

        let body = ScrapeBody {
            url,
            formats: &request.formats,
            only_main_content: request.only_main_content,
            wait_for: request.wait_for_ms,
            include_tags: &request.include_tags,
        };

        let raw = self.post_json("/v1/scrape", &body).await?;
        let response: ScrapeResponse =
            serde_json::from_str(&raw).map_err(|e| FetchError::Parse(e.to_string()))?;

        let data = match (response.success, response.data) {
            (true, Some(data)) => data,
            (_, _) => {
                return Err(FetchError::Status {
                    status: 200,
                    message: response
                        .error
                        .unwrap_or_else(|| format!("scrape of {} failed", url)),
                })
            }
        };

        let title = data
            .metadata
            .get("title")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|t| !t.trim().is_empty());

        Ok(ScrapedPage {
            url: url.to_string(),
            title,
            markdown: data.markdown.or(data.content).unwrap_or_default(),
            html: data.html.unwrap_or_default(),
            metadata: data.metadata,
        })
    }

    async fn fetch_pdf_text(&self, url: &str) -> Result<String, FetchError> {
        download_pdf_text(&self.downloads, url).await
    }
}
