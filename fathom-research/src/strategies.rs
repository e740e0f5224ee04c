//! Search Strategy Set
//!
//! Independent retrieval strategies, each gated by a keyword/heuristic
//! applicability check. Applicable strategies run concurrently; a failing,
//! panicking or timed-out strategy contributes nothing and never aborts the
//! batch. Results are merged by `(url, title)` and ranked by confidence.

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use fathom_core::{
    extract_data_points, extract_numbers_with_context, extract_pattern_matches, DataPoint,
    SearchResult, DEFAULT_CORROBORATION_VARIANCE,
};
use fathom_fetch::{
    is_file_url, FetchError, ScrapeRequest, SearchHit, SearchRequest, SharedFetcher,
};

use crate::quality::data_points_similar;

/// Strategy errors
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Strategy timed out after {0} seconds")]
    Timeout(u64),

    #[error("Strategy failed: {0}")]
    Failed(String),
}

/// Options shared by every strategy in a run
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum results per strategy
    pub max_results: usize,
    /// Per-strategy time budget in seconds
    pub timeout_secs: u64,
    /// Keep results that point at downloadable files
    pub include_files: bool,
    /// Keep extracted data points on merged results
    pub include_data: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 10,
            timeout_secs: 60,
            include_files: true,
            include_data: true,
        }
    }
}

impl SearchOptions {
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// A retrieval technique with a self-declared applicability gate
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// Strategy name, used as the `strategy` tag on its results
    fn name(&self) -> &str;

    /// Tie-break ordering (higher first); informational only
    fn priority(&self) -> u8;

    /// Whether this strategy is worth running for `query`
    fn applicable(&self, query: &str) -> bool;

    async fn execute(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, StrategyError>;
}

/// Thread-safe reference to a strategy
pub type SharedStrategy = Arc<dyn SearchStrategy>;

fn mentions_any(query: &str, keywords: &[&str]) -> bool {
    let lower = query.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

fn hit_to_result(
    hit: &SearchHit,
    data_points: Vec<DataPoint>,
    confidence: f64,
    strategy: &str,
) -> SearchResult {
    SearchResult::builder(&hit.url)
        .title(&hit.title)
        .content(hit.content())
        .data_points(data_points)
        .confidence(confidence)
        .strategy(strategy)
        .metadata_map(hit.metadata.clone())
        .build()
}

/// A canonical statistical page for an indicator keyword
#[derive(Debug, Clone, Copy)]
pub struct IndicatorSource {
    pub keyword: &'static str,
    pub url: &'static str,
    pub title: &'static str,
    pub publisher: &'static str,
}

pub static INDICATOR_SOURCES: &[IndicatorSource] = &[
    IndicatorSource {
        keyword: "gdp",
        url: "https://fred.stlouisfed.org/series/GDP",
        title: "Gross Domestic Product",
        publisher: "FRED",
    },
    IndicatorSource {
        keyword: "inflation",
        url: "https://fred.stlouisfed.org/series/CPIAUCSL",
        title: "Consumer Price Index for All Urban Consumers",
        publisher: "FRED",
    },
    IndicatorSource {
        keyword: "unemployment",
        url: "https://fred.stlouisfed.org/series/UNRATE",
        title: "Unemployment Rate",
        publisher: "FRED",
    },
    IndicatorSource {
        keyword: "census",
        url: "https://www.census.gov/quickfacts/fact/table/US/PST045223",
        title: "QuickFacts: United States",
        publisher: "U.S. Census Bureau",
    },
    IndicatorSource {
        keyword: "fda approval",
        url: "https://www.fda.gov/drugs/development-approval-process-drugs/novel-drug-approvals-fda",
        title: "Novel Drug Approvals at FDA",
        publisher: "FDA",
    },
    IndicatorSource {
        keyword: "clinical trial",
        url: "https://clinicaltrials.gov/",
        title: "ClinicalTrials.gov",
        publisher: "NIH",
    },
];

/// Scrapes canonical indicator pages for indicator-style queries
pub struct DirectApiStrategy {
    fetcher: SharedFetcher,
}

impl DirectApiStrategy {
    pub const NAME: &'static str = "Direct API Access";

    pub fn new(fetcher: SharedFetcher) -> Self {
        Self { fetcher }
    }

    /// Indicator sources named by the query
    pub fn sources_for(query: &str) -> Vec<&'static IndicatorSource> {
        let lower = query.to_lowercase();
        INDICATOR_SOURCES
            .iter()
            .filter(|s| lower.contains(s.keyword))
            .collect()
    }
}

#[async_trait]
impl SearchStrategy for DirectApiStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> u8 {
        10
    }

    fn applicable(&self, query: &str) -> bool {
        !Self::sources_for(query).is_empty()
    }

    async fn execute(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, StrategyError> {
        let sources: Vec<_> = Self::sources_for(query)
            .into_iter()
            .take(options.max_results)
            .collect();
        let request = ScrapeRequest::default();

        let pages = join_all(
            sources
                .iter()
                .map(|source| self.fetcher.scrape(source.url, &request)),
        )
        .await;

        let mut results = Vec::new();
        for (source, page) in sources.into_iter().zip(pages) {
            let page = match page {
                Ok(page) => page,
                Err(e) if e.requires_user_action() => return Err(e.into()),
                Err(e) => {
                    warn!("Indicator page {} unavailable: {}", source.url, e);
                    continue;
                }
            };

            let data_points = extract_data_points(&page.markdown, &page.html, query, &[]);
            results.push(
                SearchResult::builder(source.url)
                    .title(page.title.as_deref().unwrap_or(source.title))
                    .content(&page.markdown)
                    .data_points(data_points)
                    .confidence(0.9)
                    .strategy(Self::NAME)
                    .metadata("publisher", source.publisher)
                    .metadata("indicator", source.keyword)
                    .build(),
            );
        }

        Ok(results)
    }
}

/// Minimum cosine similarity for a hit to count as on-topic
pub const SEMANTIC_THRESHOLD: f64 = 0.1;

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut freq = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        *freq.entry(word.to_lowercase()).or_insert(0.0) += 1.0;
    }
    freq
}

/// Cosine similarity of two texts' term-frequency vectors
pub fn cosine_similarity(a: &str, b: &str) -> f64 {
    let (fa, fb) = (term_frequencies(a), term_frequencies(b));
    let dot: f64 = fa
        .iter()
        .filter_map(|(term, x)| fb.get(term).map(|y| x * y))
        .sum();
    let norm = |f: &HashMap<String, f64>| f.values().map(|v| v * v).sum::<f64>().sqrt();
    let denom = norm(&fa) * norm(&fb);
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Ranks search hits by textual similarity to long or analytical queries
pub struct SemanticSearchStrategy {
    fetcher: SharedFetcher,
}

impl SemanticSearchStrategy {
    pub const NAME: &'static str = "Semantic Document Search";

    pub fn new(fetcher: SharedFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl SearchStrategy for SemanticSearchStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> u8 {
        8
    }

    fn applicable(&self, query: &str) -> bool {
        query.split_whitespace().count() > 5 || mentions_any(query, &["how", "why"])
    }

    async fn execute(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, StrategyError> {
        let request = SearchRequest::default().with_limit(options.max_results * 2);
        let hits = self.fetcher.search(query, &request).await?;

        let mut scored: Vec<(f64, &SearchHit)> = hits
            .iter()
            .map(|hit| (cosine_similarity(query, hit.content()), hit))
            .filter(|(similarity, _)| *similarity > SEMANTIC_THRESHOLD)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(options.max_results)
            .map(|(similarity, hit)| {
                let data_points = extract_numbers_with_context(hit.content(), query);
                let mut result =
                    hit_to_result(hit, data_points, 0.5 + similarity / 2.0, Self::NAME);
                result
                    .metadata
                    .insert("similarity".to_string(), similarity.into());
                result
            })
            .collect())
    }
}

const MAGNITUDE: &str = r"(?:\s*(?:billion|million|trillion))?";

/// Query-specific regexes for the extractor's pattern pass
pub fn build_data_patterns(query: &str) -> Vec<Regex> {
    let lower = query.to_lowercase();
    let mut sources: Vec<String> = Vec::new();

    if lower.contains("revenue") {
        sources.push(format!(r"(?i)\$[\d,]+\.?\d*{}\s*(?:in\s+)?(?:revenue|sales)", MAGNITUDE));
        sources.push(format!(r"(?i)revenue\s+of\s+\$[\d,]+\.?\d*{}", MAGNITUDE));
    }
    if lower.contains("growth") {
        sources.push(r"(?i)(?:grew|increased|rose)\s+(?:by\s+)?[\d.]+%".to_string());
        sources.push(r"(?i)[\d.]+%\s+(?:growth|increase|rise)".to_string());
    }
    if lower.contains("market") {
        sources.push(format!(
            r"(?i)market\s+(?:size|value)\s+(?:of\s+)?\$[\d,]+\.?\d*{}",
            MAGNITUDE
        ));
        sources.push(format!(r"(?i)\$[\d,]+\.?\d*{}\s+market", MAGNITUDE));
    }
    if lower.contains("percentage") {
        sources.push(r"\d+(?:\.\d+)?\s*(?:%|percent)".to_string());
    }
    if lower.contains("ratio") {
        sources.push(r"(?i)ratio\s+(?:of\s+)?\d+(?:\.\d+)?(?:\s*(?::|to)\s*\d+(?:\.\d+)?)?".to_string());
    }

    sources
        .iter()
        .filter_map(|source| Regex::new(source).ok())
        .collect()
}

/// Keeps search hits where query-specific data patterns match
pub struct PatternExtractionStrategy {
    fetcher: SharedFetcher,
}

impl PatternExtractionStrategy {
    pub const NAME: &'static str = "Pattern-Based Data Extraction";

    pub fn new(fetcher: SharedFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl SearchStrategy for PatternExtractionStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> u8 {
        7
    }

    fn applicable(&self, query: &str) -> bool {
        mentions_any(
            query,
            &["revenue", "market size", "growth rate", "percentage", "ratio"],
        )
    }

    async fn execute(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, StrategyError> {
        let patterns = build_data_patterns(query);
        if patterns.is_empty() {
            return Ok(Vec::new());
        }

        let request = SearchRequest::default().with_limit(options.max_results);
        let hits = self.fetcher.search(query, &request).await?;

        Ok(hits
            .iter()
            .filter_map(|hit| {
                let matches = extract_pattern_matches(hit.content(), &patterns);
                if matches.is_empty() {
                    return None;
                }
                let confidence = (0.6 + 0.05 * matches.len() as f64).min(0.9);
                Some(hit_to_result(hit, matches, confidence, Self::NAME))
            })
            .collect())
    }
}

/// Keeps only data points that recur across independent sources
pub struct CrossReferenceStrategy {
    fetcher: SharedFetcher,
    variance: f64,
}

impl CrossReferenceStrategy {
    pub const NAME: &'static str = "Cross-Reference Validation";

    pub fn new(fetcher: SharedFetcher) -> Self {
        Self {
            fetcher,
            variance: DEFAULT_CORROBORATION_VARIANCE,
        }
    }

    pub fn with_variance(mut self, variance: f64) -> Self {
        self.variance = variance;
        self
    }

    /// Drop data points no other source corroborates; drop results left empty
    pub fn cross_validate(&self, candidates: Vec<SearchResult>) -> Vec<SearchResult> {
        let mut validated = Vec::new();

        for (idx, candidate) in candidates.iter().enumerate() {
            let host = candidate.domain();
            let others: Vec<&SearchResult> = candidates
                .iter()
                .enumerate()
                .filter(|(j, other)| *j != idx && other.domain() != host)
                .map(|(_, other)| other)
                .collect();

            let corroborated: Vec<DataPoint> = candidate
                .data_points
                .iter()
                .filter(|dp| {
                    others.iter().any(|o| {
                        o.data_points
                            .iter()
                            .any(|other| data_points_similar(dp, other, self.variance))
                    })
                })
                .cloned()
                .collect();

            if corroborated.is_empty() {
                continue;
            }

            let mut result = candidate.clone();
            result.confidence = (0.7 + 0.05 * corroborated.len() as f64).min(0.95);
            result.data_points = corroborated;
            result.strategy = Self::NAME.to_string();
            validated.push(result);
        }

        validated
    }
}

#[async_trait]
impl SearchStrategy for CrossReferenceStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> u8 {
        6
    }

    fn applicable(&self, query: &str) -> bool {
        mentions_any(query, &["verify", "accurate", "latest"])
    }

    async fn execute(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, StrategyError> {
        let request = SearchRequest::default().with_limit(options.max_results * 2);
        let hits = self.fetcher.search(query, &request).await?;

        let candidates: Vec<SearchResult> = hits
            .iter()
            .map(|hit| {
                let data_points = extract_numbers_with_context(hit.content(), query);
                hit_to_result(hit, data_points, 0.5, Self::NAME)
            })
            .collect();

        let mut validated = self.cross_validate(candidates);
        validated.truncate(options.max_results);
        Ok(validated)
    }
}

/// The set of strategies consulted for a query
#[derive(Default, Clone)]
pub struct StrategySet {
    strategies: Vec<SharedStrategy>,
}

impl StrategySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four built-in strategies over one fetcher
    pub fn with_defaults(fetcher: SharedFetcher) -> Self {
        Self::new()
            .with_strategy(Arc::new(DirectApiStrategy::new(fetcher.clone())))
            .with_strategy(Arc::new(SemanticSearchStrategy::new(fetcher.clone())))
            .with_strategy(Arc::new(PatternExtractionStrategy::new(fetcher.clone())))
            .with_strategy(Arc::new(CrossReferenceStrategy::new(fetcher)))
    }

    pub fn with_strategy(mut self, strategy: SharedStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn strategies(&self) -> &[SharedStrategy] {
        &self.strategies
    }

    /// Applicable strategies, highest priority first
    pub fn applicable(&self, query: &str) -> Vec<SharedStrategy> {
        let mut applicable: Vec<SharedStrategy> = self
            .strategies
            .iter()
            .filter(|s| s.applicable(query))
            .cloned()
            .collect();
        applicable.sort_by(|a, b| b.priority().cmp(&a.priority()));
        applicable
    }

    /// Run every applicable strategy concurrently and merge their results
    pub async fn execute_multi_strategy(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Vec<SearchResult> {
        let applicable = self.applicable(query);
        info!(
            "Running {} applicable strategies for '{}'",
            applicable.len(),
            query
        );

        let timeout = Duration::from_secs(options.timeout_secs);
        let handles: Vec<_> = applicable
            .iter()
            .map(|strategy| {
                let strategy = strategy.clone();
                let query = query.to_string();
                let options = options.clone();
                tokio::spawn(async move {
                    match tokio::time::timeout(timeout, strategy.execute(&query, &options)).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(StrategyError::Timeout(options.timeout_secs)),
                    }
                })
            })
            .collect();

        let outcomes = join_all(handles).await;

        let mut all = Vec::new();
        for (strategy, outcome) in applicable.iter().zip(outcomes) {
            match outcome {
                Ok(Ok(results)) => {
                    debug!("Strategy {} returned {} results", strategy.name(), results.len());
                    all.extend(results);
                }
                Ok(Err(e)) => warn!("Strategy {} failed: {}", strategy.name(), e),
                Err(e) => warn!("Strategy {} aborted: {}", strategy.name(), e),
            }
        }

        let mut merged = deduplicate_and_rank(all);
        if !options.include_files {
            merged.retain(|r| !is_file_url(&r.url));
        }
        if !options.include_data {
            merged.iter_mut().for_each(|r| r.data_points.clear());
        }
        merged
    }
}

/// Merge by `(url, title)` keeping the higher-confidence instance, then sort by confidence
pub fn deduplicate_and_rank(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut unique: Vec<SearchResult> = Vec::new();

    for result in results {
        let key = (result.url.clone(), result.title.clone());
        match index.get(&key) {
            Some(&idx) => {
                if result.confidence > unique[idx].confidence {
                    unique[idx] = result;
                }
            }
            None => {
                index.insert(key, unique.len());
                unique.push(result);
            }
        }
    }

    unique.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn result_urls(results: &[SearchResult]) -> HashSet<&str> {
        results.iter().map(|r| r.url.as_str()).collect()
    }

    struct FixedStrategy {
        name: &'static str,
        applicable: bool,
        results: Vec<SearchResult>,
        calls: AtomicUsize,
    }

    impl FixedStrategy {
        fn new(name: &'static str, applicable: bool, results: Vec<SearchResult>) -> Arc<Self> {
            Arc::new(Self {
                name,
                applicable,
                results,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SearchStrategy for FixedStrategy {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> u8 {
            5
        }

        fn applicable(&self, _query: &str) -> bool {
            self.applicable
        }

        async fn execute(
            &self,
            _query: &str,
            _options: &SearchOptions,
        ) -> Result<Vec<SearchResult>, StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.results.clone())
        }
    }

    struct FailingStrategy;

    #[async_trait]
    impl SearchStrategy for FailingStrategy {
        fn name(&self) -> &str {
            "failing"
        }

        fn priority(&self) -> u8 {
            9
        }

        fn applicable(&self, _query: &str) -> bool {
            true
        }

        async fn execute(
            &self,
            _query: &str,
            _options: &SearchOptions,
        ) -> Result<Vec<SearchResult>, StrategyError> {
            Err(StrategyError::Failed("boom".to_string()))
        }
    }

    struct PanickingStrategy;

    #[async_trait]
    impl SearchStrategy for PanickingStrategy {
        fn name(&self) -> &str {
            "panicking"
        }

        fn priority(&self) -> u8 {
            1
        }

        fn applicable(&self, _query: &str) -> bool {
            true
        }

        async fn execute(
            &self,
            _query: &str,
            _options: &SearchOptions,
        ) -> Result<Vec<SearchResult>, StrategyError> {
            panic!("strategy bug");
        }
    }

    struct SlowStrategy;

    #[async_trait]
    impl SearchStrategy for SlowStrategy {
        fn name(&self) -> &str {
            "slow"
        }

        fn priority(&self) -> u8 {
            2
        }

        fn applicable(&self, _query: &str) -> bool {
            true
        }

        async fn execute(
            &self,
            _query: &str,
            _options: &SearchOptions,
        ) -> Result<Vec<SearchResult>, StrategyError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![result("https://slow.com", "Slow", 1.0)])
        }
    }

    fn result(url: &str, title: &str, confidence: f64) -> SearchResult {
        SearchResult::builder(url)
            .title(title)
            .confidence(confidence)
            .build()
    }

    #[tokio::test]
    async fn test_inapplicable_strategy_never_executes() {
        let skipped = FixedStrategy::new("skipped", false, vec![result("https://a.com", "A", 0.9)]);
        let used = FixedStrategy::new("used", true, vec![result("https://b.com", "B", 0.4)]);
        let set = StrategySet::new()
            .with_strategy(skipped.clone())
            .with_strategy(used.clone());

        let results = set
            .execute_multi_strategy("anything", &SearchOptions::default())
            .await;

        assert_eq!(skipped.calls.load(Ordering::SeqCst), 0);
        assert_eq!(used.calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://b.com");
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_siblings() {
        let good = FixedStrategy::new(
            "good",
            true,
            vec![result("https://a.com", "A", 0.5), result("https://b.com", "B", 0.8)],
        );
        let set = StrategySet::new()
            .with_strategy(Arc::new(FailingStrategy))
            .with_strategy(Arc::new(PanickingStrategy))
            .with_strategy(Arc::new(SlowStrategy))
            .with_strategy(good);

        let options = SearchOptions::default().with_timeout(1);
        let results = set.execute_multi_strategy("anything", &options).await;

        let urls = result_urls(&results);
        assert_eq!(urls.len(), 2);
        assert!(urls.contains("https://a.com") && urls.contains("https://b.com"));
        assert_eq!(results[0].url, "https://b.com");
    }

    #[tokio::test]
    async fn test_include_flags_filter_merged_results() {
        let with_data = SearchResult::builder("https://a.com/page")
            .title("A")
            .data_points(vec![DataPoint::new("3.9%", fathom_core::DataSource::Content)])
            .confidence(0.5)
            .build();
        let file = result("https://a.com/report.pdf", "Report", 0.6);
        let set = StrategySet::new().with_strategy(FixedStrategy::new(
            "fixed",
            true,
            vec![with_data, file],
        ));

        let mut options = SearchOptions::default();
        options.include_files = false;
        options.include_data = false;
        let results = set.execute_multi_strategy("anything", &options).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://a.com/page");
        assert!(results[0].data_points.is_empty());
    }

    #[test]
    fn test_deduplicate_keeps_higher_confidence() {
        let merged = deduplicate_and_rank(vec![
            result("https://a.com", "A", 0.4),
            result("https://a.com", "A", 0.7),
            result("https://a.com", "Other title", 0.1),
            result("https://b.com", "B", 0.6),
        ]);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].url, "https://a.com");
        assert!((merged[0].confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(merged[1].url, "https://b.com");
        assert_eq!(merged[2].title, "Other title");
    }

    #[test]
    fn test_applicability_gates() {
        let fetcher: SharedFetcher = Arc::new(MockFetcher::new());
        let direct = DirectApiStrategy::new(fetcher.clone());
        let semantic = SemanticSearchStrategy::new(fetcher.clone());
        let pattern = PatternExtractionStrategy::new(fetcher.clone());
        let cross = CrossReferenceStrategy::new(fetcher.clone());

        assert!(direct.applicable("US GDP 2024"));
        assert!(direct.applicable("FDA approval timeline"));
        assert!(!direct.applicable("pharma revenue"));

        assert!(semantic.applicable("why did prices rise"));
        assert!(semantic.applicable("one two three four five six"));
        assert!(!semantic.applicable("steel output"));

        assert!(pattern.applicable("Apple revenue 2023"));
        assert!(pattern.applicable("EV market size"));
        assert!(!pattern.applicable("market trends"));

        assert!(cross.applicable("latest unemployment figure"));
        assert!(!cross.applicable("unemployment figure"));

        let set = StrategySet::with_defaults(fetcher);
        let names: Vec<String> = set
            .applicable("verify latest gdp revenue")
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                DirectApiStrategy::NAME,
                PatternExtractionStrategy::NAME,
                CrossReferenceStrategy::NAME
            ]
        );
    }

    #[test]
    fn test_build_data_patterns() {
        let patterns = build_data_patterns("company revenue growth");
        assert_eq!(patterns.len(), 4);

        let text = "Total revenue of $4.2 billion; sales grew by 12%.";
        let matches = extract_pattern_matches(text, &patterns);
        let values: Vec<&str> = matches.iter().map(|m| m.value.as_str()).collect();
        assert!(values.contains(&"revenue of $4.2 billion"));
        assert!(values.contains(&"grew by 12%"));

        assert!(build_data_patterns("steel output").is_empty());
        assert_eq!(build_data_patterns("debt ratio").len(), 1);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity("steel output", "steel output") - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity("steel", "pharma"), 0.0);
        assert_eq!(cosine_similarity("", "pharma"), 0.0);
        let partial = cosine_similarity("steel output 2024", "global steel production");
        assert!(partial > 0.0 && partial < 1.0);
    }

    #[tokio::test]
    async fn test_direct_api_scrapes_indicator_pages() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_page(
                    "https://fred.stlouisfed.org/series/GDP",
                    "GDP | FRED",
                    "Gross Domestic Product (GDP) 2024: 29,184.9 billions of dollars",
                    "<table><tr><td>2024-Q3</td><td>29,374.9</td></tr></table>",
                )
                .with_failure("https://fred.stlouisfed.org/series/UNRATE", 500),
        );
        let strategy = DirectApiStrategy::new(fetcher.clone());

        let results = strategy
            .execute("gdp and unemployment", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let gdp = &results[0];
        assert_eq!(gdp.strategy, DirectApiStrategy::NAME);
        assert!((gdp.confidence - 0.9).abs() < f64::EPSILON);
        assert!(gdp.data_points.iter().any(|dp| dp.value == "29,374.9"));
        assert_eq!(gdp.metadata_str("publisher"), Some("FRED"));
        assert_eq!(fetcher.scraped().len(), 2);
    }

    #[tokio::test]
    async fn test_direct_api_surfaces_quota_failures() {
        let fetcher = Arc::new(
            MockFetcher::new().with_failure("https://fred.stlouisfed.org/series/GDP", 402),
        );
        let strategy = DirectApiStrategy::new(fetcher);
        let err = strategy
            .execute("gdp", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::Fetch(e) if e.requires_user_action()));
    }

    #[tokio::test]
    async fn test_semantic_filters_off_topic_hits() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_hit(
                    "https://a.com/steel",
                    "Steel",
                    "why steel prices rose in 2024: steel output fell 4% while demand for steel grew",
                )
                .with_hit("https://b.com/cats", "Cats", "kittens purr softly"),
        );
        let strategy = SemanticSearchStrategy::new(fetcher);

        let results = strategy
            .execute("why did steel prices rise", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://a.com/steel");
        assert!(results[0].confidence > 0.5);
        assert!(results[0].metadata.contains_key("similarity"));
    }

    #[tokio::test]
    async fn test_pattern_keeps_only_matching_hits() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_hit("https://a.com", "A", "Acme posted revenue of $3.1 billion this year")
                .with_hit("https://b.com", "B", "Acme revenue was strong"),
        );
        let strategy = PatternExtractionStrategy::new(fetcher);

        let results = strategy
            .execute("acme revenue", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://a.com");
        assert_eq!(results[0].data_points[0].value, "revenue of $3.1 billion");
    }

    #[tokio::test]
    async fn test_cross_reference_keeps_recurring_points() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_hit("https://a.com/x", "A", "latest unemployment rate 3.9% and 150,000 jobs")
                .with_hit("https://b.org/y", "B", "latest unemployment rate 3.9% reported")
                .with_hit("https://c.net/z", "C", "latest unemployment rate 7.5% claimed"),
        );
        let strategy = CrossReferenceStrategy::new(fetcher);

        let results = strategy
            .execute("latest unemployment", &SearchOptions::default())
            .await
            .unwrap();

        let urls = result_urls(&results);
        assert_eq!(urls.len(), 2);
        assert!(!urls.contains("https://c.net/z"));
        for r in &results {
            assert_eq!(r.strategy, CrossReferenceStrategy::NAME);
            assert!(r.data_points.iter().all(|dp| dp.value == "3.9%"));
        }
    }
}
