//! Unlinked report discovery
//!
//! Pages often name a study or dataset without linking it. A [`ReportFinder`]
//! turns such mentions into downloadable document URLs. Discovery is strictly
//! best-effort: every failure yields an empty list.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use fathom_core::truncate_chars;
use fathom_fetch::{is_pdf_url, SearchRequest, SharedFetcher};

use crate::{generate_structured, SharedBackend};

/// Characters of page text shown to the model
const MAX_PROMPT_CONTENT: usize = 8000;

/// Finds document URLs for reports mentioned in page text
#[async_trait]
pub trait ReportFinder: Send + Sync {
    async fn find_reports(&self, content: &str, query: &str) -> Vec<String>;
}

/// Thread-safe reference to a report finder
pub type SharedReportFinder = Arc<dyn ReportFinder>;

/// Finder used when no language model is configured
pub struct NoReportFinder;

#[async_trait]
impl ReportFinder for NoReportFinder {
    async fn find_reports(&self, _content: &str, _query: &str) -> Vec<String> {
        Vec::new()
    }
}

/// A report named in page text
#[derive(Debug, Clone, Deserialize)]
pub struct ReportMention {
    pub name: String,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub year: Option<serde_json::Value>,
}

impl ReportMention {
    /// Search query for a PDF of this report
    pub fn search_query(&self) -> String {
        let year = match &self.year {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let parts = [
            format!("\"{}\"", self.name.trim()),
            self.publisher.clone().unwrap_or_default(),
            year,
            "filetype:pdf".to_string(),
        ];
        parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Deserialize)]
struct MentionedReports {
    #[serde(default)]
    reports: Vec<ReportMention>,
}

const SYSTEM_PROMPT: &str = "You read web page text and list research reports, studies or \
datasets that the text names without linking to them. Respond with JSON only, shaped as \
{\"reports\": [{\"name\": string, \"publisher\": string, \"year\": string}]}. \
Use an empty array when nothing is named.";

/// Asks a language model for named reports, then searches for each one's PDF
pub struct LlmReportFinder {
    backend: SharedBackend,
    fetcher: SharedFetcher,
}

impl LlmReportFinder {
    pub fn new(backend: SharedBackend, fetcher: SharedFetcher) -> Self {
        Self { backend, fetcher }
    }

    pub fn shared(self) -> SharedReportFinder {
        Arc::new(self)
    }

    async fn mentioned_reports(&self, content: &str, query: &str) -> Vec<ReportMention> {
        let user = format!(
            "Research query: {}\n\nPage text:\n---\n{}",
            query,
            truncate_chars(content, MAX_PROMPT_CONTENT)
        );

        match generate_structured::<MentionedReports>(self.backend.as_ref(), SYSTEM_PROMPT, &user)
            .await
        {
            Ok(parsed) => parsed
                .reports
                .into_iter()
                .filter(|r| !r.name.trim().is_empty())
                .collect(),
            Err(e) => {
                warn!("Report discovery via {} failed: {}", self.backend.model_name(), e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl ReportFinder for LlmReportFinder {
    async fn find_reports(&self, content: &str, query: &str) -> Vec<String> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let mut found = Vec::new();
        let request = SearchRequest::default().with_limit(1).links_only();

        for report in self.mentioned_reports(content, query).await {
            let search_query = report.search_query();
            debug!("Searching for mentioned report: {}", search_query);

            match self.fetcher.search(&search_query, &request).await {
                Ok(hits) => {
                    if let Some(hit) = hits.first().filter(|h| is_pdf_url(&h.url)) {
                        if !found.contains(&hit.url) {
                            debug!("Found report PDF: {}", hit.url);
                            found.push(hit.url.clone());
                        }
                    }
                }
                Err(e) => warn!("Report search '{}' failed: {}", search_query, e),
            }
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;
    use crate::{LlmBackend, LlmError};

    struct CannedBackend(Result<&'static str, ()>);

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn generate(&self, _system: &str, user: &str) -> Result<String, LlmError> {
            assert!(user.contains("Research query:"));
            self.0
                .map(str::to_string)
                .map_err(|_| LlmError::Api("unavailable".to_string()))
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    const STEEL_REPORTS: &str = r#"{"reports": [
        {"name": "Global Steel Outlook", "publisher": "OECD", "year": 2024},
        {"name": "Scrap Market Review"}
    ]}"#;

    #[test]
    fn test_search_query() {
        let mention = ReportMention {
            name: " Global Steel Outlook ".to_string(),
            publisher: Some("OECD".to_string()),
            year: Some(serde_json::json!(2024)),
        };
        assert_eq!(
            mention.search_query(),
            "\"Global Steel Outlook\" OECD 2024 filetype:pdf"
        );

        let bare = ReportMention {
            name: "Scrap Market Review".to_string(),
            publisher: None,
            year: None,
        };
        assert_eq!(bare.search_query(), "\"Scrap Market Review\" filetype:pdf");
    }

    #[tokio::test]
    async fn test_llm_finder_keeps_pdf_hits() {
        let fetcher = Arc::new(
            MockFetcher::new().with_hit("https://oecd.org/steel-outlook.pdf", "Outlook", ""),
        );
        let finder = LlmReportFinder::new(Arc::new(CannedBackend(Ok(STEEL_REPORTS))), fetcher.clone());

        let urls = finder
            .find_reports("The Global Steel Outlook says output rose.", "steel output")
            .await;

        assert_eq!(urls, vec!["https://oecd.org/steel-outlook.pdf".to_string()]);
        assert_eq!(
            fetcher.searches(),
            vec![
                "\"Global Steel Outlook\" OECD 2024 filetype:pdf".to_string(),
                "\"Scrap Market Review\" filetype:pdf".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_llm_finder_ignores_non_pdf_hits() {
        let fetcher = Arc::new(MockFetcher::new().with_hit("https://oecd.org/outlook", "Outlook", ""));
        let finder = LlmReportFinder::new(Arc::new(CannedBackend(Ok(STEEL_REPORTS))), fetcher);

        assert!(finder.find_reports("text", "steel").await.is_empty());
    }

    #[tokio::test]
    async fn test_failures_yield_nothing() {
        let fetcher = Arc::new(MockFetcher::new().with_hit("https://a.org/r.pdf", "R", ""));

        let broken = LlmReportFinder::new(Arc::new(CannedBackend(Err(()))), fetcher.clone());
        assert!(broken.find_reports("text", "steel").await.is_empty());

        let garbled = LlmReportFinder::new(Arc::new(CannedBackend(Ok("no json here"))), fetcher.clone());
        assert!(garbled.find_reports("text", "steel").await.is_empty());

        let failing_search = Arc::new(MockFetcher::new().with_search_failure(500));
        let finder = LlmReportFinder::new(Arc::new(CannedBackend(Ok(STEEL_REPORTS))), failing_search);
        assert!(finder.find_reports("text", "steel").await.is_empty());

        assert!(NoReportFinder.find_reports("text", "steel").await.is_empty());
        assert!(fetcher.searches().is_empty());
    }
}
