//! In-memory fetcher used by unit tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use fathom_core::Metadata;
use fathom_fetch::{
    classify_status, FetchError, ScrapeRequest, ScrapedPage, SearchHit, SearchRequest, WebFetcher,
};

/// Serves a fixed page graph and search hit list, recording every scrape
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, ScrapedPage>,
    pdfs: HashMap<String, String>,
    hits: Vec<SearchHit>,
    failing: HashMap<String, u16>,
    failing_pdfs: HashMap<String, u16>,
    search_failure: Option<u16>,
    not_ready: bool,
    scraped: Mutex<Vec<String>>,
    searches: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, title: &str, markdown: &str, html: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            ScrapedPage {
                url: url.to_string(),
                title: Some(title.to_string()),
                markdown: markdown.to_string(),
                html: html.to_string(),
                metadata: Metadata::new(),
            },
        );
        self
    }

    pub fn with_pdf(mut self, url: &str, text: &str) -> Self {
        self.pdfs.insert(url.to_string(), text.to_string());
        self
    }

    pub fn with_hit(mut self, url: &str, title: &str, markdown: &str) -> Self {
        self.hits.push(SearchHit {
            url: url.to_string(),
            title: title.to_string(),
            description: String::new(),
            markdown: markdown.to_string(),
            score: None,
            metadata: Metadata::new(),
        });
        self
    }

    /// Scrapes of `url` fail with `status`
    pub fn with_failure(mut self, url: &str, status: u16) -> Self {
        self.failing.insert(url.to_string(), status);
        self
    }

    /// Downloads of `url` fail with `status`, as a document host would answer
    pub fn with_pdf_failure(mut self, url: &str, status: u16) -> Self {
        self.failing_pdfs.insert(url.to_string(), status);
        self
    }

    pub fn with_search_failure(mut self, status: u16) -> Self {
        self.search_failure = Some(status);
        self
    }

    /// Report a missing credential from `ensure_ready`
    pub fn not_ready(mut self) -> Self {
        self.not_ready = true;
        self
    }

    pub fn scraped(&self) -> Vec<String> {
        self.scraped.lock().unwrap().clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebFetcher for MockFetcher {
    fn ensure_ready(&self) -> Result<(), FetchError> {
        if self.not_ready {
            Err(FetchError::MissingApiKey)
        } else {
            Ok(())
        }
    }

    async fn search(
        &self,
        query: &str,
        request: &SearchRequest,
    ) -> Result<Vec<SearchHit>, FetchError> {
        self.searches.lock().unwrap().push(query.to_string());
        if let Some(status) = self.search_failure {
            return Err(classify_status(status, "search failed"));
        }
        Ok(self.hits.iter().take(request.limit).cloned().collect())
    }

    async fn scrape(&self, url: &str, _request: &ScrapeRequest) -> Result<ScrapedPage, FetchError> {
        self.scraped.lock().unwrap().push(url.to_string());
        if let Some(status) = self.failing.get(url) {
            return Err(classify_status(*status, "scrape failed"));
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| classify_status(404, "not found"))
    }

    async fn fetch_pdf_text(&self, url: &str) -> Result<String, FetchError> {
        self.scraped.lock().unwrap().push(url.to_string());
        if let Some(status) = self.failing_pdfs.get(url) {
            return Err(FetchError::Status {
                status: *status,
                message: "document download failed".to_string(),
            });
        }
        self.pdfs
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Pdf(format!("no document at {}", url)))
    }
}

/// Distinct URLs in a scrape log
pub fn distinct(urls: &[String]) -> HashSet<&str> {
    urls.iter().map(String::as_str).collect()
}
