//! Result records flowing through the research pipeline
//!
//! - [`SearchResult`]: one retrieved candidate document
//! - [`CrawlResult`]: one page or file reached by the crawler
//! - [`ScoredResult`]: a search result with quality metrics, only built by the scorer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::text::{host_of, truncate_chars};
use crate::DataPoint;

/// Open key-value bag (content type, file type, source type, crawl depth, parent URL)
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Characters kept in a result summary
pub const SUMMARY_LENGTH: usize = 300;

/// One retrieved candidate document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    /// Full extracted text
    pub content: String,
    /// Leading excerpt of the content
    pub summary: String,
    #[serde(default)]
    pub data_points: Vec<DataPoint>,
    /// Baseline retrieval confidence, independent of quality scoring
    pub confidence: f64,
    /// Retrieval path that produced this result
    pub strategy: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SearchResult {
    /// Create a builder for a result at `url`
    pub fn builder(url: &str) -> SearchResultBuilder {
        SearchResultBuilder::new(url)
    }

    /// Hostname without `www.`
    pub fn domain(&self) -> Option<String> {
        host_of(&self.url)
    }

    /// String metadata value, if present
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Builder for [`SearchResult`]
#[derive(Debug, Clone)]
pub struct SearchResultBuilder {
    url: String,
    title: Option<String>,
    content: String,
    summary: Option<String>,
    data_points: Vec<DataPoint>,
    confidence: f64,
    strategy: String,
    metadata: Metadata,
}

impl SearchResultBuilder {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            title: None,
            content: String::new(),
            summary: None,
            data_points: Vec::new(),
            confidence: 0.5,
            strategy: String::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        if !title.trim().is_empty() {
            self.title = Some(title.to_string());
        }
        self
    }

    pub fn content(mut self, content: &str) -> Self {
        self.content = content.to_string();
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn data_points(mut self, data_points: Vec<DataPoint>) -> Self {
        self.data_points = data_points;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn strategy(mut self, strategy: &str) -> Self {
        self.strategy = strategy.to_string();
        self
    }

    pub fn metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn metadata_map(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }

    pub fn build(self) -> SearchResult {
        let summary = self
            .summary
            .unwrap_or_else(|| truncate_chars(&self.content, SUMMARY_LENGTH));

        SearchResult {
            title: self.title.unwrap_or_else(|| self.url.clone()),
            url: self.url,
            content: self.content,
            summary,
            data_points: self.data_points,
            confidence: self.confidence,
            strategy: self.strategy,
            metadata: self.metadata,
        }
    }
}

/// One crawled page or file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    pub url: String,
    pub title: String,
    pub content: String,
    /// Link distance from the seed URL
    pub depth: u32,
    pub data_points: Vec<DataPoint>,
    /// In-domain page links
    pub links: Vec<String>,
    /// In-domain document links (pdf/xlsx/xls/csv/docx)
    pub file_links: Vec<String>,
    pub relevance_score: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl CrawlResult {
    /// Convert into a search result tagged with the deep-dive strategy
    pub fn into_search_result(self) -> SearchResult {
        let kind = self
            .metadata
            .get("contentType")
            .and_then(|v| v.as_str())
            .unwrap_or("webpage")
            .to_string();

        SearchResult::builder(&self.url)
            .title(&self.title)
            .content(&self.content)
            .data_points(self.data_points)
            .confidence(self.relevance_score)
            .strategy(&format!("Deep-Dive ({})", kind))
            .metadata_map(self.metadata)
            .metadata("crawlDepth", self.depth)
            .build()
    }
}

/// Corroboration level of a result's data points against the rest of the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Partial,
    #[default]
    Unverified,
}

/// Fixed weights of the overall quality score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub authority: f64,
    pub freshness: f64,
    pub completeness: f64,
    pub accuracy: f64,
    pub relevance: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            authority: 0.25,
            freshness: 0.15,
            completeness: 0.20,
            accuracy: 0.25,
            relevance: 0.15,
        }
    }
}

/// Explainable multi-factor quality score; every score is in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub authority_score: f64,
    pub freshness_score: f64,
    pub completeness_score: f64,
    pub accuracy_score: f64,
    pub relevance_score: f64,
    pub overall_score: f64,
    pub confidence: f64,
    pub explanation: String,
}

impl QualityMetrics {
    /// Flat metrics used when scoring is unavailable
    pub fn neutral(confidence: f64) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            authority_score: 0.5,
            freshness_score: 0.5,
            completeness_score: 0.5,
            accuracy_score: 0.5,
            relevance_score: confidence,
            overall_score: confidence,
            confidence,
            explanation: "Quality scoring unavailable".to_string(),
        }
    }

    /// Weighted sum of the five sub-scores
    pub fn weighted_overall(&self, weights: &ScoreWeights) -> f64 {
        let overall = self.authority_score * weights.authority
            + self.freshness_score * weights.freshness
            + self.completeness_score * weights.completeness
            + self.accuracy_score * weights.accuracy
            + self.relevance_score * weights.relevance;
        overall.clamp(0.0, 1.0)
    }

    pub fn recompute_overall(&mut self, weights: &ScoreWeights) {
        self.overall_score = self.weighted_overall(weights);
    }
}

/// A search result augmented with quality metrics and corroboration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    #[serde(flatten)]
    pub result: SearchResult,
    pub quality_metrics: QualityMetrics,
    pub verification_status: VerificationStatus,
    /// URLs of other results corroborating at least one data point
    pub cross_references: Vec<String>,
}

impl ScoredResult {
    pub fn url(&self) -> &str {
        &self.result.url
    }
}
