//! Deep Search Orchestrator
//!
//! Runs one research query through a fixed sequence of stages:
//! - Broad web search for recall, with data points extracted from each hit
//! - Initial quality scoring
//! - Intelligent crawl of the top-ranked seeds, one at a time
//! - Re-scoring of the merged result set
//! - Finalization into ranked, display-ready results
//!
//! Stage transitions are reported through an optional progress callback.
//! Partial failures degrade the answer but never fail the run; only missing
//! configuration and collaborator failures that need user action do.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use fathom_core::{
    extract_data_points, host_of, MemoryQualityStore, QualityMetrics, ScoredResult, SearchResult,
    SharedQualityStore, VerificationStatus,
};
use fathom_fetch::{
    file_extension, CollaboratorFailure, FetchConfig, FetchError, FirecrawlClient, SearchRequest,
    SharedFetcher,
};
use fathom_research::{
    create_backend, CrawlError, CrawlOptions, IntelligentCrawler, LlmConfig, LlmProvider,
    LlmReportFinder, NoReportFinder, QualityScorer, ScoringConfig, SearchOptions, SharedBackend,
    SharedReportFinder, StrategySet,
};

/// Strategy tag of broad search results
pub const BROAD_SEARCH_STRATEGY: &str = "Broad Web Search";

/// Description attached to every display source
pub const DISCOVERED_SOURCE: &str = "Discovered Web Source";

/// Keywords that become target data-point labels when the caller names none
const TARGET_KEYWORDS: &[&str] = &[
    "revenue",
    "profit",
    "earnings",
    "sales",
    "growth",
    "market cap",
    "price",
    "value",
    "percentage",
    "rate",
    "ratio",
    "index",
    "gdp",
    "inflation",
    "unemployment",
    "interest rate",
];

/// Failures surfaced to the caller of a deep search
#[derive(Debug, Error)]
pub enum DeepSearchError {
    #[error("Deep search is not configured: {0}")]
    Config(String),

    #[error("{0}")]
    Collaborator(CollaboratorFailure),
}

impl DeepSearchError {
    /// What the user can do about it
    pub fn hint(&self) -> &'static str {
        match self {
            DeepSearchError::Config(_) => "Set FIRECRAWL_API_KEY or pass --firecrawl-key.",
            DeepSearchError::Collaborator(failure) => failure.hint(),
        }
    }

    fn from_fetch(error: &FetchError) -> Option<Self> {
        match error {
            FetchError::MissingApiKey => Some(DeepSearchError::Config(error.to_string())),
            _ => error
                .collaborator_failure()
                .cloned()
                .map(DeepSearchError::Collaborator),
        }
    }
}

impl From<CrawlError> for DeepSearchError {
    fn from(error: CrawlError) -> Self {
        match error {
            CrawlError::Config(message) => DeepSearchError::Config(message),
            CrawlError::Collaborator(failure) => DeepSearchError::Collaborator(failure),
        }
    }
}

/// Deep search options
#[derive(Debug, Clone)]
pub struct DeepSearchOptions {
    /// Base crawl depth per seed
    pub max_depth: u32,
    pub include_files: bool,
    pub include_spreadsheets: bool,
    pub include_databases: bool,
    /// Labels of the figures being looked for (e.g. "revenue")
    pub target_data_points: Vec<String>,
    /// Sector label biasing relevance
    pub sector: Option<String>,
    /// Result cap of the broad search
    pub broad_limit: usize,
    /// Top-ranked results crawled as seeds
    pub seed_count: usize,
    /// Crawl budget per seed
    pub pages_per_seed: usize,
    /// Size of the final result list
    pub top_n: usize,
    /// Wall-clock budget for the whole run
    pub time_budget: Duration,
    /// Also run the search strategy set and merge its results
    pub use_multi_strategy: bool,
    pub use_quality_scoring: bool,
    pub use_intelligent_crawling: bool,
}

impl Default for DeepSearchOptions {
    fn default() -> Self {
        Self {
            max_depth: 2,
            include_files: true,
            include_spreadsheets: true,
            include_databases: true,
            target_data_points: Vec::new(),
            sector: None,
            broad_limit: 40,
            seed_count: 5,
            pages_per_seed: 10,
            top_n: 10,
            time_budget: Duration::from_secs(300),
            use_multi_strategy: false,
            use_quality_scoring: true,
            use_intelligent_crawling: true,
        }
    }
}

impl DeepSearchOptions {
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_sector(mut self, sector: &str) -> Self {
        self.sector = Some(sector.to_string()).filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_target_data_points(mut self, labels: Vec<String>) -> Self {
        self.target_data_points = labels;
        self
    }

    pub fn with_seed_count(mut self, seed_count: usize) -> Self {
        self.seed_count = seed_count;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_time_budget(mut self, time_budget: Duration) -> Self {
        self.time_budget = time_budget;
        self
    }

    pub fn with_files(mut self, include_files: bool) -> Self {
        self.include_files = include_files;
        self
    }
}

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeepSearchStage {
    BroadSearch,
    InitialScoring,
    Crawling,
    Rescoring,
    Finalizing,
    Complete,
}

impl fmt::Display for DeepSearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeepSearchStage::BroadSearch => "Searching the web",
            DeepSearchStage::InitialScoring => "Scoring initial results",
            DeepSearchStage::Crawling => "Crawling top sources",
            DeepSearchStage::Rescoring => "Re-scoring with crawled data",
            DeepSearchStage::Finalizing => "Ranking final results",
            DeepSearchStage::Complete => "Complete",
        };
        f.write_str(label)
    }
}

/// Progress update sent at each stage boundary and per crawled seed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepSearchProgress {
    pub completed: usize,
    pub total: usize,
    pub stage: DeepSearchStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_seed: Option<String>,
}

/// Progress sink
pub type ProgressCallback = Arc<dyn Fn(DeepSearchProgress) + Send + Sync>;

/// Coarse kind of a ranked result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Webpage,
    File,
    Spreadsheet,
    Database,
}

/// Display descriptor of a result's source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub domain: String,
    pub name: String,
    pub description: String,
    pub categories: Vec<String>,
}

/// A final, display-ready deep search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub url: String,
    pub title: String,
    pub content: String,
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    /// Overall quality score, or retrieval confidence when the run was unscored
    pub relevance_score: f64,
    pub data_points: Vec<String>,
    pub source: SourceDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_metrics: Option<QualityMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<VerificationStatus>,
    pub cross_references: Vec<String>,
    pub strategy: String,
}

impl RankedResult {
    /// Overall quality, or relevance when the result was not scored
    pub fn rank_score(&self) -> f64 {
        self.quality_metrics
            .as_ref()
            .map(|m| m.overall_score)
            .unwrap_or(self.relevance_score)
    }
}

/// Collaborator credentials for [`perform_deep_search`]
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub firecrawl_api_key: Option<String>,
    pub firecrawl_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Language model override
    pub model: Option<String>,
}

impl Credentials {
    /// Optional language model for report discovery; unusable keys are skipped
    pub fn language_model(&self) -> Option<SharedBackend> {
        let key = |k: &Option<String>| k.clone().filter(|k| !k.trim().is_empty());

        let config = if let Some(anthropic) = key(&self.anthropic_api_key) {
            LlmConfig::new(LlmProvider::Anthropic, &anthropic)
        } else if let Some(openai) = key(&self.openai_api_key) {
            LlmConfig::new(LlmProvider::OpenAi, &openai)
        } else {
            debug!("No language model configured; report discovery disabled");
            return None;
        };
        let config = match self.model.as_deref().filter(|m| !m.trim().is_empty()) {
            Some(model) => config.with_model(model),
            None => config,
        };

        match create_backend(config) {
            Ok(backend) => Some(backend),
            Err(e) => {
                warn!("Language model unavailable, report discovery disabled: {}", e);
                None
            }
        }
    }
}

/// Run a deep search against the Firecrawl collaborator.
///
/// Uses a fresh known-source quality store; build a [`DeepSearch`] directly to
/// share learned authority across runs.
pub async fn perform_deep_search(
    query: &str,
    options: &DeepSearchOptions,
    credentials: &Credentials,
    progress: Option<ProgressCallback>,
) -> Result<Vec<RankedResult>, DeepSearchError> {
    let mut config = FetchConfig::default();
    if let Some(key) = &credentials.firecrawl_api_key {
        config = config.with_api_key(key);
    }
    if let Some(base_url) = &credentials.firecrawl_base_url {
        config = config.with_base_url(base_url);
    }

    let fetcher = FirecrawlClient::new(config)
        .map_err(|e| DeepSearchError::Config(e.to_string()))?
        .shared();

    let mut search = DeepSearch::new(fetcher.clone());
    if let Some(backend) = credentials.language_model() {
        search = search.with_report_finder(LlmReportFinder::new(backend, fetcher).shared());
    }

    search.run(query, options, progress).await
}

/// Deep search pipeline over one fetcher and quality store
pub struct DeepSearch {
    fetcher: SharedFetcher,
    store: SharedQualityStore,
    reports: SharedReportFinder,
    strategies: StrategySet,
    crawl: CrawlOptions,
    scoring: ScoringConfig,
}

impl DeepSearch {
    pub fn new(fetcher: SharedFetcher) -> Self {
        Self {
            strategies: StrategySet::with_defaults(fetcher.clone()),
            fetcher,
            store: MemoryQualityStore::with_known_sources().shared(),
            reports: Arc::new(NoReportFinder),
            crawl: CrawlOptions::default(),
            scoring: ScoringConfig::default(),
        }
    }

    pub fn with_store(mut self, store: SharedQualityStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_report_finder(mut self, reports: SharedReportFinder) -> Self {
        self.reports = reports;
        self
    }

    pub fn with_strategies(mut self, strategies: StrategySet) -> Self {
        self.strategies = strategies;
        self
    }

    /// Crawl tuning; depth, page budget, files and patterns come from each run's options
    pub fn with_crawl_options(mut self, crawl: CrawlOptions) -> Self {
        self.crawl = crawl;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// Run the full pipeline for `query`
    pub async fn run(
        &self,
        query: &str,
        options: &DeepSearchOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<RankedResult>, DeepSearchError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("deep_search", %run_id, query);
        self.run_stages(query, options, progress).instrument(span).await
    }

    async fn run_stages(
        &self,
        query: &str,
        options: &DeepSearchOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<RankedResult>, DeepSearchError> {
        self.fetcher
            .ensure_ready()
            .map_err(|e| DeepSearchError::Config(e.to_string()))?;

        let deadline = Instant::now() + options.time_budget;
        let mut reporter = ProgressReporter::new(progress, 4 + options.seed_count);

        let labels = target_labels(query, &options.target_data_points);
        let patterns = label_patterns(&labels);
        debug!("Target data point labels: {:?}", labels);

        reporter.stage(DeepSearchStage::BroadSearch, None);
        let mut results = self.broad_search(query, options, &patterns, deadline).await?;
        if options.use_multi_strategy {
            let search_options = SearchOptions {
                include_files: options.include_files,
                ..SearchOptions::default()
            };
            let extra = self
                .strategies
                .execute_multi_strategy(query, &search_options)
                .await;
            info!("Strategy set added {} candidates", extra.len());
            results = merge_by_url(results, extra);
        }
        info!("Broad search produced {} candidates", results.len());

        reporter.advance(DeepSearchStage::InitialScoring, None);
        let scored = self.score(results, query, options);

        let seeds: Vec<String> = if options.use_intelligent_crawling {
            scored
                .iter()
                .take(options.seed_count)
                .map(|s| s.result.url.clone())
                .collect()
        } else {
            Vec::new()
        };
        reporter.set_total(4 + seeds.len());

        let mut crawled = Vec::new();
        for seed in &seeds {
            reporter.advance(DeepSearchStage::Crawling, Some(seed));

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("Time budget exhausted, skipping seed {}", seed);
                continue;
            }

            match timeout(remaining, self.crawl_seed(seed, query, options, &patterns)).await {
                Ok(Ok(pages)) => {
                    debug!("Seed {} yielded {} crawl results", seed, pages.len());
                    crawled.extend(pages.into_iter().map(|p| p.into_search_result()));
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => warn!("Crawl of seed {} ran out of time", seed),
            }
        }

        reporter.advance(DeepSearchStage::Rescoring, None);
        let merged = merge_by_url(scored.into_iter().map(|s| s.result).collect(), crawled);
        let rescored = self.score(merged, query, options);

        reporter.advance(DeepSearchStage::Finalizing, None);
        let ranked = finalize(rescored, options);

        reporter.advance(DeepSearchStage::Complete, None);
        info!("Deep search returned {} results", ranked.len());
        Ok(ranked)
    }

    async fn broad_search(
        &self,
        query: &str,
        options: &DeepSearchOptions,
        patterns: &[Regex],
        deadline: Instant,
    ) -> Result<Vec<SearchResult>, DeepSearchError> {
        let request = SearchRequest::default().with_limit(options.broad_limit);
        let remaining = deadline.saturating_duration_since(Instant::now());

        let hits = match timeout(remaining, self.fetcher.search(query, &request)).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                if let Some(fatal) = DeepSearchError::from_fetch(&e) {
                    return Err(fatal);
                }
                warn!("Broad search failed: {}", e);
                Vec::new()
            }
            Err(_) => {
                warn!("Broad search ran out of time");
                Vec::new()
            }
        };

        Ok(hits
            .into_iter()
            .filter(|hit| !hit.content().trim().is_empty())
            .map(|hit| {
                let content = hit.content().to_string();
                let data_points = extract_data_points(&content, "", query, patterns);
                SearchResult::builder(&hit.url)
                    .title(&hit.title)
                    .content(&content)
                    .data_points(data_points)
                    .confidence(hit.score.unwrap_or(0.5).clamp(0.0, 1.0))
                    .strategy(BROAD_SEARCH_STRATEGY)
                    .metadata_map(hit.metadata)
                    .build()
            })
            .collect())
    }

    async fn crawl_seed(
        &self,
        seed: &str,
        query: &str,
        options: &DeepSearchOptions,
        patterns: &[Regex],
    ) -> Result<Vec<fathom_core::CrawlResult>, CrawlError> {
        let crawl_options = self
            .crawl
            .clone()
            .with_max_depth(options.max_depth)
            .with_max_pages(options.pages_per_seed)
            .with_files(options.include_files)
            .with_data_patterns(patterns.to_vec());

        let crawler =
            IntelligentCrawler::new(self.fetcher.clone()).with_report_finder(self.reports.clone());
        let domain = host_of(seed).unwrap_or_default();

        crawler.crawl(seed, query, &domain, &crawl_options).await
    }

    /// Score a batch, falling back to neutral metrics when scoring is off or fails
    fn score(
        &self,
        results: Vec<SearchResult>,
        query: &str,
        options: &DeepSearchOptions,
    ) -> Vec<ScoredResult> {
        if options.use_quality_scoring {
            let scorer = QualityScorer::new(self.store.clone()).with_config(self.scoring.clone());
            match scorer.score_results(results.clone(), query, options.sector.as_deref()) {
                Ok(scored) => return scored,
                Err(e) => warn!("Quality scoring failed, using neutral metrics: {}", e),
            }
        }

        let mut neutral: Vec<ScoredResult> = results
            .into_iter()
            .map(|result| ScoredResult {
                quality_metrics: QualityMetrics::neutral(result.confidence),
                verification_status: VerificationStatus::Unverified,
                cross_references: Vec::new(),
                result,
            })
            .collect();
        neutral.sort_by(|a, b| {
            b.quality_metrics
                .overall_score
                .total_cmp(&a.quality_metrics.overall_score)
        });
        neutral
    }
}

struct ProgressReporter {
    callback: Option<ProgressCallback>,
    completed: usize,
    total: usize,
}

impl ProgressReporter {
    fn new(callback: Option<ProgressCallback>, total: usize) -> Self {
        Self {
            callback,
            completed: 0,
            total,
        }
    }

    fn set_total(&mut self, total: usize) {
        self.total = total;
    }

    fn advance(&mut self, stage: DeepSearchStage, current_seed: Option<&str>) {
        self.completed = (self.completed + 1).min(self.total);
        self.stage(stage, current_seed);
    }

    fn stage(&self, stage: DeepSearchStage, current_seed: Option<&str>) {
        debug!("Stage: {} ({}/{})", stage, self.completed, self.total);
        if let Some(callback) = &self.callback {
            callback(DeepSearchProgress {
                completed: self.completed,
                total: self.total,
                stage,
                current_seed: current_seed.map(str::to_string),
            });
        }
    }
}

/// Caller labels, or labels found in the query
pub fn target_labels(query: &str, requested: &[String]) -> Vec<String> {
    let requested: Vec<String> = requested
        .iter()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect();
    if !requested.is_empty() {
        return requested;
    }

    let lower = query.to_lowercase();
    TARGET_KEYWORDS
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect()
}

/// One "label ... number" pattern per label
pub fn label_patterns(labels: &[String]) -> Vec<Regex> {
    labels
        .iter()
        .filter_map(|label| {
            Regex::new(&format!(
                r"(?i)\b{}\b[\s:]*(?:of|was|is|at|reached|to)?\s*\$?\d[\d,]*(?:\.\d+)?\s*(?:%|percent|billion|million|trillion)?",
                regex::escape(label)
            ))
            .ok()
        })
        .collect()
}

/// Merge `extra` into `base` by URL, keeping the instance with more data
/// points, then the more confident one
pub fn merge_by_url(mut base: Vec<SearchResult>, extra: Vec<SearchResult>) -> Vec<SearchResult> {
    for candidate in extra {
        match base.iter_mut().find(|r| r.url == candidate.url) {
            Some(existing) => {
                let richer = candidate.data_points.len() > existing.data_points.len();
                let same = candidate.data_points.len() == existing.data_points.len();
                if richer || (same && candidate.confidence > existing.confidence) {
                    *existing = candidate;
                }
            }
            None => base.push(candidate),
        }
    }
    base
}

/// Content kind and file type of a result
pub fn infer_content_type(result: &SearchResult) -> (ContentType, Option<String>) {
    let declared_file_type = result.metadata_str("fileType").map(str::to_string);

    if result.metadata_str("contentType") == Some("pdf") {
        return (ContentType::File, Some("pdf".to_string()));
    }

    match file_extension(&result.url).as_deref() {
        Some(".pdf") => return (ContentType::File, Some("pdf".to_string())),
        Some(".docx") => return (ContentType::File, Some("docx".to_string())),
        Some(ext @ (".xlsx" | ".xls" | ".csv")) => {
            return (
                ContentType::Spreadsheet,
                Some(ext.trim_start_matches('.').to_string()),
            )
        }
        _ => {}
    }

    if result.metadata_str("sourceType") == Some("database") {
        return (ContentType::Database, declared_file_type);
    }

    (ContentType::Webpage, declared_file_type)
}

fn source_descriptor(result: &SearchResult, sector: Option<&str>) -> SourceDescriptor {
    let domain = result.domain().unwrap_or_else(|| result.url.clone());
    SourceDescriptor {
        name: domain.clone(),
        domain,
        description: DISCOVERED_SOURCE.to_string(),
        categories: sector.map(|s| vec![s.to_string()]).unwrap_or_default(),
    }
}

/// Map scored results to ranked results, filter by content type, sort and truncate
pub fn finalize(scored: Vec<ScoredResult>, options: &DeepSearchOptions) -> Vec<RankedResult> {
    let mut ranked: Vec<RankedResult> = scored
        .into_iter()
        .filter_map(|scored| {
            let (content_type, file_type) = infer_content_type(&scored.result);
            let keep = match content_type {
                ContentType::File => options.include_files,
                ContentType::Spreadsheet => options.include_spreadsheets,
                ContentType::Database => options.include_databases,
                ContentType::Webpage => true,
            };
            if !keep {
                return None;
            }

            let (quality_metrics, verification_status, relevance_score) =
                if options.use_quality_scoring {
                    let overall = scored.quality_metrics.overall_score;
                    (
                        Some(scored.quality_metrics),
                        Some(scored.verification_status),
                        overall,
                    )
                } else {
                    (None, None, scored.result.confidence)
                };

            let result = scored.result;
            Some(RankedResult {
                source: source_descriptor(&result, options.sector.as_deref()),
                data_points: result.data_points.iter().map(|dp| dp.display()).collect(),
                url: result.url,
                title: result.title,
                content: result.content,
                content_type,
                file_type,
                relevance_score,
                quality_metrics,
                verification_status,
                cross_references: scored.cross_references,
                strategy: result.strategy,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.rank_score()
            .total_cmp(&a.rank_score())
            .then_with(|| b.relevance_score.total_cmp(&a.relevance_score))
    });
    ranked.truncate(options.top_n);
    ranked
}
