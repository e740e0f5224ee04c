//! Quality Scorer
//!
//! Turns a raw result batch into a ranked, cross-validated set. Each result gets
//! five sub-scores (authority, freshness, completeness, accuracy, relevance), a
//! fixed-weight overall score, a reported confidence and a short explanation.
//! A second batch-wide pass boosts accuracy for data points that recur across
//! results.
//!
//! Learned authority and explicit verification flags live in an injected
//! [`fathom_core::QualityStore`]; the scorer itself holds no mutable state.

use chrono::{NaiveDate, Utc};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

use fathom_core::{
    domain_candidates, query_terms, tld_floor, verification_key, DataPoint, DataPointType,
    QualityMetrics, ScoreWeights, ScoredResult, SearchResult, SharedQualityStore,
    VerificationStatus, DEFAULT_AUTHORITY, DEFAULT_CORROBORATION_VARIANCE,
};

/// Scoring errors
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Score weights sum to {0}, expected 1.0")]
    InvalidWeights(f64),
}

/// Scorer configuration
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    /// Relative difference under which two numeric data points agree
    pub corroboration_variance: f64,
    /// Corroborated fraction at or above which a result is verified;
    /// any smaller non-zero fraction is partial
    pub verified_ratio: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            corroboration_variance: DEFAULT_CORROBORATION_VARIANCE,
            verified_ratio: 0.8,
        }
    }
}

impl ScoringConfig {
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_variance(mut self, variance: f64) -> Self {
        self.corroboration_variance = variance;
        self
    }
}

const HTTPS_BONUS: f64 = 0.05;
const CROSS_VALIDATION_BOOST: f64 = 0.1;

const COVERAGE_INDICATORS: &[&str] = &[
    "overview",
    "summary",
    "comprehensive",
    "detailed",
    "analysis",
    "report",
    "study",
    "research",
];

const MONTHS: &[&str] = &[
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const MONTH_ALTERNATION: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

static SLASH_DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());

static ISO_DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());

static MONTH_DAY_YEAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\s+(\d{{1,2}}),?\s+(\d{{4}})\b", MONTH_ALTERNATION)).unwrap()
});

static MONTH_YEAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\s+(\d{{4}})\b", MONTH_ALTERNATION)).unwrap()
});

static QUARTER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bQ([1-4])\s+(\d{4})\b").unwrap());

static CITATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\[\d+\]",
        r"\(\d{4}\)",
        r"(?i)Source:",
        r"(?i)Reference:",
        r"(?i)According to",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Multi-factor result scorer backed by a quality store
pub struct QualityScorer {
    store: SharedQualityStore,
    config: ScoringConfig,
}

impl QualityScorer {
    pub fn new(store: SharedQualityStore) -> Self {
        Self {
            store,
            config: ScoringConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ScoringConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a batch against today's date
    pub fn score_results(
        &self,
        results: Vec<SearchResult>,
        query: &str,
        sector: Option<&str>,
    ) -> Result<Vec<ScoredResult>, ScoringError> {
        self.score_results_at(results, query, sector, Utc::now().date_naive())
    }

    /// Score a batch, measuring freshness against `today`
    pub fn score_results_at(
        &self,
        results: Vec<SearchResult>,
        query: &str,
        sector: Option<&str>,
        today: NaiveDate,
    ) -> Result<Vec<ScoredResult>, ScoringError> {
        let w = &self.config.weights;
        let weight_sum = w.authority + w.freshness + w.completeness + w.accuracy + w.relevance;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(ScoringError::InvalidWeights(weight_sum));
        }

        let mut scored: Vec<ScoredResult> = results
            .iter()
            .map(|result| {
                let quality_metrics = self.quality_metrics(result, query, sector, today);
                let (verification_status, cross_references) = self.corroboration(result, &results);
                ScoredResult {
                    result: result.clone(),
                    quality_metrics,
                    verification_status,
                    cross_references,
                }
            })
            .collect();

        self.adjust_with_cross_validation(&mut scored);

        scored.sort_by(|a, b| {
            b.quality_metrics
                .overall_score
                .total_cmp(&a.quality_metrics.overall_score)
        });

        debug!("Scored {} results for '{}'", scored.len(), query);
        Ok(scored)
    }

    /// All five sub-scores, overall, confidence and explanation for one result
    pub fn quality_metrics(
        &self,
        result: &SearchResult,
        query: &str,
        sector: Option<&str>,
        today: NaiveDate,
    ) -> QualityMetrics {
        let mut metrics = QualityMetrics {
            authority_score: self.authority_score(result),
            freshness_score: freshness_score(&result.content, today),
            completeness_score: completeness_score(result, query),
            accuracy_score: self.accuracy_score(result),
            relevance_score: relevance_score(result, query, sector),
            overall_score: 0.0,
            confidence: 0.0,
            explanation: String::new(),
        };
        metrics.recompute_overall(&self.config.weights);
        metrics.confidence = reported_confidence(result, metrics.overall_score);
        metrics.explanation = explain(&metrics);
        metrics
    }

    /// Known or learned domain authority, raised by TLD floors and HTTPS
    pub fn authority_score(&self, result: &SearchResult) -> f64 {
        let mut score = DEFAULT_AUTHORITY;

        if let Some(host) = result.domain() {
            for candidate in domain_candidates(&host) {
                if let Some(authority) = self.store.authority(candidate) {
                    score = score.max(authority);
                }
            }
            if let Some(floor) = tld_floor(&host) {
                score = score.max(floor);
            }
        }

        if result.url.starts_with("https://") {
            score += HTTPS_BONUS;
        }

        score.min(1.0)
    }

    /// Data-point confidence and citation density, overridden by explicit verification
    pub fn accuracy_score(&self, result: &SearchResult) -> f64 {
        let key = verification_key(&result.url, &result.data_points);
        match self.store.verification(&key) {
            Some(true) => return 0.95,
            Some(false) => return 0.3,
            None => {}
        }

        let mut score: f64 = 0.7;
        if result.data_points.iter().any(|dp| dp.confidence > 0.8) {
            score += 0.1;
        }

        let citations: usize = CITATION_PATTERNS
            .iter()
            .map(|p| p.find_iter(&result.content).count())
            .sum();
        if citations > 0 {
            score += 0.1;
        }
        if citations > 5 {
            score += 0.1;
        }

        score.min(1.0)
    }

    /// Verification status and corroborating URLs for one result within a batch
    pub fn corroboration(
        &self,
        result: &SearchResult,
        all: &[SearchResult],
    ) -> (VerificationStatus, Vec<String>) {
        let variance = self.config.corroboration_variance;
        let mut corroborated = 0;
        let mut references: Vec<String> = Vec::new();

        for dp in &result.data_points {
            let mut found = false;
            for other in all.iter().filter(|r| r.url != result.url) {
                if other
                    .data_points
                    .iter()
                    .any(|o| data_points_similar(dp, o, variance))
                {
                    found = true;
                    if !references.contains(&other.url) {
                        references.push(other.url.clone());
                    }
                }
            }
            if found {
                corroborated += 1;
            }
        }

        let status = if corroborated == 0 {
            VerificationStatus::Unverified
        } else {
            let ratio = corroborated as f64 / result.data_points.len() as f64;
            if ratio >= self.config.verified_ratio {
                VerificationStatus::Verified
            } else {
                VerificationStatus::Partial
            }
        };

        (status, references)
    }

    /// Boost accuracy of every result sharing a data point with another result
    fn adjust_with_cross_validation(&self, scored: &mut [ScoredResult]) {
        let mut groups: BTreeMap<(DataPointType, String), BTreeSet<usize>> = BTreeMap::new();

        for (idx, entry) in scored.iter().enumerate() {
            for dp in &entry.result.data_points {
                groups.entry(group_key(dp)).or_default().insert(idx);
            }
        }

        let mut touched = BTreeSet::new();
        for members in groups.values().filter(|m| m.len() > 1) {
            for &idx in members {
                let metrics = &mut scored[idx].quality_metrics;
                metrics.accuracy_score = (metrics.accuracy_score + CROSS_VALIDATION_BOOST).min(1.0);
                touched.insert(idx);
            }
        }

        for idx in touched {
            let metrics = &mut scored[idx].quality_metrics;
            metrics.recompute_overall(&self.config.weights);
            metrics.explanation = explain(metrics);
        }
    }

    /// Nudge a domain's learned authority; returns the new score
    pub fn update_authority_score(&self, domain: &str, delta: f64) -> f64 {
        let domain = domain.trim_start_matches("www.").to_lowercase();
        self.store.adjust_authority(&domain, delta)
    }

    /// Record an explicit verification verdict for a (url, data points) pair
    pub fn mark_data_verification(&self, url: &str, data_points: &[DataPoint], verified: bool) {
        self.store
            .set_verification(&verification_key(url, data_points), verified);
    }
}

/// Same type, and numerically within `variance` (or textually equal when non-numeric)
pub fn data_points_similar(a: &DataPoint, b: &DataPoint, variance: f64) -> bool {
    if a.data_type != b.data_type {
        return false;
    }

    let (digits_a, digits_b) = (a.numeric_digits(), b.numeric_digits());
    if digits_a.is_empty() || digits_b.is_empty() {
        return a.value == b.value;
    }

    match (a.numeric_value(), b.numeric_value()) {
        (Some(x), Some(y)) => {
            let max = x.abs().max(y.abs());
            if max == 0.0 {
                true
            } else {
                (x - y).abs() / max < variance
            }
        }
        _ => false,
    }
}

fn group_key(dp: &DataPoint) -> (DataPointType, String) {
    let digits = dp.numeric_digits();
    if digits.is_empty() {
        (dp.data_type, dp.value.to_lowercase())
    } else {
        (dp.data_type, digits)
    }
}

/// Most recent date mentioned in `content` that is not after `today`
pub fn most_recent_date(content: &str, today: NaiveDate) -> Option<NaiveDate> {
    let mut dates: Vec<NaiveDate> = Vec::new();

    for cap in SLASH_DATE_REGEX.captures_iter(content) {
        dates.extend(ymd(&cap[3], &cap[1], &cap[2]));
    }
    for cap in ISO_DATE_REGEX.captures_iter(content) {
        dates.extend(ymd(&cap[1], &cap[2], &cap[3]));
    }
    for cap in MONTH_DAY_YEAR_REGEX.captures_iter(content) {
        if let Some(month) = month_number(&cap[1]) {
            dates.extend(ymd(&cap[3], &month.to_string(), &cap[2]));
        }
    }
    for cap in MONTH_YEAR_REGEX.captures_iter(content) {
        if let Some(month) = month_number(&cap[1]) {
            dates.extend(ymd(&cap[2], &month.to_string(), "1"));
        }
    }
    for cap in QUARTER_REGEX.captures_iter(content) {
        let quarter: u32 = cap[1].parse().unwrap_or(1);
        dates.extend(ymd(&cap[2], &((quarter - 1) * 3 + 1).to_string(), "1"));
    }

    dates.into_iter().filter(|d| *d <= today).max()
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == name)
        .map(|idx| idx as u32 + 1)
}

/// Age bracket of the most recent date; 0.5 when no date is found
pub fn freshness_score(content: &str, today: NaiveDate) -> f64 {
    let Some(date) = most_recent_date(content, today) else {
        return 0.5;
    };

    match (today - date).num_days() {
        d if d <= 30 => 1.0,
        d if d <= 90 => 0.9,
        d if d <= 180 => 0.8,
        d if d <= 365 => 0.7,
        d if d <= 730 => 0.5,
        _ => 0.3,
    }
}

/// Query coverage, data-point yield, coverage words and length
pub fn completeness_score(result: &SearchResult, query: &str) -> f64 {
    let terms = query_terms(query);
    let content = result.content.to_lowercase();
    let mut score = 0.0;

    if !terms.is_empty() {
        let found = terms.iter().filter(|t| content.contains(t.as_str())).count();
        score += found as f64 / terms.len() as f64 * 0.3;
    }

    let count = result.data_points.len();
    if count > 0 {
        score += 0.2;
    }
    if count > 5 {
        score += 0.1;
    }
    if count > 10 {
        score += 0.1;
    }

    score += COVERAGE_INDICATORS
        .iter()
        .filter(|word| content.contains(*word))
        .count() as f64
        * 0.05;

    let length = result.content.chars().count();
    if length > 500 {
        score += 0.1;
    }
    if length > 2000 {
        score += 0.1;
    }

    score.min(1.0)
}

/// Retrieval confidence plus proximity, title and sector boosts
pub fn relevance_score(result: &SearchResult, query: &str, sector: Option<&str>) -> f64 {
    let terms = query_terms(query);
    let mut score = if result.confidence > 0.0 {
        result.confidence
    } else {
        0.5
    };

    if !terms.is_empty() {
        let words: Vec<String> = result
            .content
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        let covered = words.windows(terms.len()).any(|window| {
            let joined = window.join(" ");
            terms.iter().all(|t| joined.contains(t.as_str()))
        });
        if covered {
            score += 0.1;
        }
    }

    let title = result.title.to_lowercase();
    score += terms.iter().filter(|t| title.contains(t.as_str())).count() as f64 * 0.05;

    if let Some(sector) = sector.map(str::to_lowercase).filter(|s| !s.is_empty()) {
        if result.content.to_lowercase().contains(&sector)
            || title.contains(&sector)
            || result.url.to_lowercase().contains(&sector)
        {
            score += 0.15;
        }
    }

    score.min(1.0)
}

/// Overall score blended with mean data-point confidence, plus strategy bonuses
pub fn reported_confidence(result: &SearchResult, overall: f64) -> f64 {
    let mut confidence = overall;

    if !result.data_points.is_empty() {
        let mean = result.data_points.iter().map(|dp| dp.confidence).sum::<f64>()
            / result.data_points.len() as f64;
        confidence = (confidence + mean) / 2.0;
    }

    match result.strategy.as_str() {
        "Direct API Access" => confidence += 0.1,
        "Cross-Reference Validation" => confidence += 0.05,
        _ => {}
    }

    confidence.min(1.0)
}

/// Qualitative bucket labels, no numbers
pub fn explain(metrics: &QualityMetrics) -> String {
    let mut parts = Vec::new();

    if metrics.authority_score >= 0.9 {
        parts.push("Highly authoritative source");
    } else if metrics.authority_score >= 0.7 {
        parts.push("Reputable source");
    }

    if metrics.freshness_score >= 0.9 {
        parts.push("Very recent data");
    } else if metrics.freshness_score <= 0.5 {
        parts.push("Data may be outdated");
    }

    if metrics.completeness_score >= 0.8 {
        parts.push("Comprehensive coverage");
    }
    if metrics.accuracy_score >= 0.9 {
        parts.push("High confidence in accuracy");
    }
    if metrics.relevance_score >= 0.8 {
        parts.push("Highly relevant to query");
    }

    if parts.is_empty() {
        "Standard quality result".to_string()
    } else {
        parts.join(". ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fathom_core::{DataSource, MemoryQualityStore};

    fn scorer() -> QualityScorer {
        QualityScorer::new(MemoryQualityStore::with_known_sources().shared())
    }

    fn gdp_point(value: &str) -> DataPoint {
        DataPoint::new(value, DataSource::Content).with_context("US GDP 2024")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn scenario_a() -> Vec<SearchResult> {
        vec![
            SearchResult::builder("https://www.bea.gov/data/gdp")
                .title("Gross Domestic Product")
                .content("US GDP 2024: the economy reached $27.36 trillion. Released March 2024.")
                .data_points(vec![gdp_point("$27.36 trillion")])
                .confidence(0.6)
                .build(),
            SearchResult::builder("https://econblog.com/gdp")
                .title("GDP thoughts")
                .content("US GDP 2024 is about $27.36 trillion according to estimates")
                .data_points(vec![gdp_point("$27.36 trillion")])
                .confidence(0.6)
                .build(),
            SearchResult::builder("https://moneytalk.com/us-economy")
                .title("Economy")
                .content("The US GDP 2024 figure of 27.36 trillion dollars")
                .data_points(vec![gdp_point("27.36 trillion")])
                .confidence(0.6)
                .build(),
        ]
    }

    #[test]
    fn test_scenario_a_gov_ranks_highest_and_all_corroborated() {
        let scored = scorer()
            .score_results_at(scenario_a(), "US GDP 2024", None, date(2024, 4, 15))
            .unwrap();

        assert_eq!(scored.len(), 3);
        let gov = scored.iter().find(|s| s.url().contains("bea.gov")).unwrap();

        for other in scored.iter().filter(|s| !s.url().contains("bea.gov")) {
            assert!(gov.quality_metrics.authority_score > other.quality_metrics.authority_score);
            assert!(gov.quality_metrics.freshness_score > other.quality_metrics.freshness_score);
        }
        for s in &scored {
            assert_ne!(s.verification_status, VerificationStatus::Unverified);
            assert_eq!(s.cross_references.len(), 2);
        }
        assert_eq!(scored[0].url(), "https://www.bea.gov/data/gdp");
    }

    #[test]
    fn test_scores_are_bounded_and_weighted() {
        let mut results = scenario_a();
        results.push(
            SearchResult::builder("http://empty.example")
                .confidence(0.0)
                .build(),
        );
        results.push(
            SearchResult::builder("https://census.gov/overview")
                .title("US GDP 2024 overview summary")
                .content(&"US GDP 2024 overview summary comprehensive detailed analysis report study research [1] (2023) Source: Reference: According to ".repeat(40))
                .data_points((0..12).map(|i| gdp_point(&format!("{}%", i + 1))).collect())
                .confidence(1.0)
                .strategy("Direct API Access")
                .build(),
        );

        let s = scorer();
        let weights = s.config().weights;
        let scored = s
            .score_results_at(results, "US GDP 2024", Some("economy"), date(2024, 4, 15))
            .unwrap();

        for r in &scored {
            let m = &r.quality_metrics;
            for score in [
                m.authority_score,
                m.freshness_score,
                m.completeness_score,
                m.accuracy_score,
                m.relevance_score,
                m.overall_score,
                m.confidence,
            ] {
                assert!((0.0..=1.0).contains(&score), "{} out of range", score);
            }
            assert!((m.overall_score - m.weighted_overall(&weights)).abs() < 1e-9);
            assert!(!m.explanation.chars().any(|c| c.is_ascii_digit()));
        }

        for pair in scored.windows(2) {
            assert!(pair[0].quality_metrics.overall_score >= pair[1].quality_metrics.overall_score);
        }
    }

    #[test]
    fn test_corroboration_never_lowers_accuracy() {
        let s = scorer();
        let today = date(2024, 4, 15);
        let results = vec![
            SearchResult::builder("https://a.com/x")
                .content("unemployment 3.9%")
                .data_points(vec![
                    gdp_point("3.9%"),
                    gdp_point("Table 4b"),
                    gdp_point("$10"),
                    gdp_point("$20"),
                    gdp_point("$30"),
                ])
                .build(),
            SearchResult::builder("https://b.com/y")
                .content("unemployment 4.0%")
                .data_points(vec![gdp_point("4.0%")])
                .build(),
        ];

        let before = s.accuracy_score(&results[0]);
        let scored = s
            .score_results_at(results, "unemployment", None, today)
            .unwrap();

        let a = scored.iter().find(|r| r.url() == "https://a.com/x").unwrap();
        assert_eq!(a.verification_status, VerificationStatus::Partial);
        assert_eq!(a.cross_references, vec!["https://b.com/y".to_string()]);
        assert!(a.quality_metrics.accuracy_score >= before);

        let b = scored.iter().find(|r| r.url() == "https://b.com/y").unwrap();
        assert_eq!(b.verification_status, VerificationStatus::Verified);
    }

    #[test]
    fn test_similarity() {
        let v = DEFAULT_CORROBORATION_VARIANCE;
        assert!(data_points_similar(&gdp_point("$27.36 trillion"), &gdp_point("27.5 trillion"), v));
        assert!(!data_points_similar(&gdp_point("$27 trillion"), &gdp_point("$30 trillion"), v));
        assert!(!data_points_similar(&gdp_point("3.9%"), &gdp_point("$3.9"), v));
        assert!(data_points_similar(&gdp_point("0%"), &gdp_point("0.0%"), v));
    }

    #[test]
    fn test_freshness_brackets() {
        let today = date(2024, 6, 30);
        assert_eq!(freshness_score("Updated 06/15/2024", today), 1.0);
        assert_eq!(freshness_score("Released 2024-04-20", today), 0.9);
        assert_eq!(freshness_score("As of January 5, 2024", today), 0.8);
        assert_eq!(freshness_score("Q3 2023 results", today), 0.7);
        assert_eq!(freshness_score("March 2023 and also 1999-01-01", today), 0.5);
        assert_eq!(freshness_score("Data from 2001-01-01", today), 0.3);
        assert_eq!(freshness_score("No dates here", today), 0.5);
        assert_eq!(freshness_score("Forecast for 2030-01-01", today), 0.5);
    }

    #[test]
    fn test_authority_floor_and_https() {
        let s = scorer();
        let score = |url: &str| s.authority_score(&SearchResult::builder(url).build());

        assert!((score("https://www.census.gov/x") - 1.0).abs() < 1e-9);
        assert!((score("https://data.bls.gov/x") - 1.0).abs() < 1e-9);
        assert!((score("https://www.gartner.com/x") - 0.90).abs() < 1e-9);
        assert!((score("http://mit.edu") - 0.85).abs() < 1e-9);
        assert!((score("https://wikipedia.org") - 0.80).abs() < 1e-9);
        assert!((score("http://blog.com") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_relevance_boosts() {
        let result = SearchResult::builder("https://x.com/pharma")
            .title("Drug pricing trends")
            .content("Recent drug pricing trends in the market")
            .confidence(0.4)
            .build();

        let plain = relevance_score(&result, "drug pricing", None);
        assert!((plain - (0.4 + 0.1 + 0.1)).abs() < 1e-9);

        let with_sector = relevance_score(&result, "drug pricing", Some("Pharma"));
        assert!((with_sector - (plain + 0.15)).abs() < 1e-9);
    }

    #[test]
    fn test_feedback_operations() {
        let store = MemoryQualityStore::new().shared();
        let s = QualityScorer::new(store.clone());

        assert!((s.update_authority_score("www.blog.com", 0.3) - 0.8).abs() < 1e-9);
        assert!((store.authority("blog.com").unwrap() - 0.8).abs() < 1e-9);
        assert_eq!(s.update_authority_score("blog.com", 2.0), 1.0);

        let result = SearchResult::builder("https://blog.com/a")
            .data_points(vec![gdp_point("$5")])
            .build();
        s.mark_data_verification(&result.url, &result.data_points, false);
        assert!((s.accuracy_score(&result) - 0.3).abs() < 1e-9);
        s.mark_data_verification(&result.url, &result.data_points, true);
        assert!((s.accuracy_score(&result) - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let weights = ScoreWeights {
            authority: 0.5,
            ..ScoreWeights::default()
        };
        let s = scorer().with_config(ScoringConfig::default().with_weights(weights));
        assert!(matches!(
            s.score_results(scenario_a(), "gdp", None),
            Err(ScoringError::InvalidWeights(_))
        ));
    }

    #[test]
    fn test_explanation_fallback() {
        let metrics = QualityMetrics {
            authority_score: 0.6,
            freshness_score: 0.7,
            completeness_score: 0.5,
            accuracy_score: 0.7,
            relevance_score: 0.5,
            overall_score: 0.6,
            confidence: 0.6,
            explanation: String::new(),
        };
        assert_eq!(explain(&metrics), "Standard quality result");
    }
}
