//! Intelligent Crawler
//!
//! Best-first crawl of one site starting from a seed URL. Pages are scored for
//! relevance to the query, their data points extracted, and promising links
//! queued. Branches rich in data may go deeper than the configured depth
//! (adaptive depth), bounded by twice the base depth.
//!
//! All crawl state lives in the run, so one crawler can serve concurrent
//! crawls.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use fathom_core::{
    extract_data_points, host_of, query_terms, CrawlResult, DataPoint, DataPointType, Metadata,
    DEFAULT_TIE_TOLERANCE,
};
use fathom_fetch::{
    detect_source_type, extract_links, file_name, is_pdf_url, CollaboratorFailure, FetchError,
    ScrapeRequest, SharedFetcher,
};

use crate::{NoReportFinder, SharedReportFinder};

/// Crawl errors that end a run
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Crawler is not configured: {0}")]
    Config(String),

    #[error("{0}")]
    Collaborator(CollaboratorFailure),
}

impl CrawlError {
    /// Escalate a fetch failure that a retry on another page cannot fix
    fn escalate(error: &FetchError) -> Option<Self> {
        match error {
            FetchError::MissingApiKey => Some(CrawlError::Config(error.to_string())),
            _ if error.requires_user_action() => error
                .collaborator_failure()
                .cloned()
                .map(CrawlError::Collaborator),
            _ => None,
        }
    }
}

/// Crawl configuration
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Base link depth from the seed
    pub max_depth: u32,
    /// Fetch budget (pages and files)
    pub max_pages: usize,
    pub follow_links: bool,
    /// Let data-rich branches exceed `max_depth`
    pub adaptive_depth: bool,
    /// Extra extraction patterns applied to page content
    pub data_patterns: Vec<Regex>,
    /// Minimum link score for adaptive queueing
    pub relevance_threshold: f64,
    /// Relevance gap within which frontier nodes are ordered by depth
    pub tie_tolerance: f64,
    pub links_per_page: usize,
    pub adaptive_links_per_page: usize,
    /// Crawl linked and discovered PDF documents
    pub include_files: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 50,
            follow_links: true,
            adaptive_depth: true,
            data_patterns: Vec::new(),
            relevance_threshold: 0.3,
            tie_tolerance: DEFAULT_TIE_TOLERANCE,
            links_per_page: 10,
            adaptive_links_per_page: 15,
            include_files: true,
        }
    }
}

impl CrawlOptions {
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    pub fn with_adaptive_depth(mut self, adaptive_depth: bool) -> Self {
        self.adaptive_depth = adaptive_depth;
        self
    }

    pub fn with_data_patterns(mut self, data_patterns: Vec<Regex>) -> Self {
        self.data_patterns = data_patterns;
        self
    }

    pub fn with_files(mut self, include_files: bool) -> Self {
        self.include_files = include_files;
        self
    }

    /// Deepest level any branch can reach
    pub fn depth_ceiling(&self) -> u32 {
        if self.adaptive_depth {
            (self.max_depth + 3).min(self.max_depth * 2)
        } else {
            self.max_depth
        }
    }
}

/// Frontier entry
#[derive(Debug, Clone)]
struct CrawlNode {
    url: String,
    depth: u32,
    parent: Option<String>,
    relevance_score: f64,
    explored: bool,
}

/// What a crawl did, beyond its results
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    pub results: Vec<CrawlResult>,
    /// URLs fetched, in order
    pub visited: Vec<String>,
    /// Fetches that failed and were skipped
    pub failed: usize,
}

/// Per-run crawl state
#[derive(Default)]
struct CrawlRun {
    frontier: Vec<CrawlNode>,
    queued: HashSet<String>,
    outcome: CrawlOutcome,
}

impl CrawlRun {
    fn enqueue(&mut self, url: &str, depth: u32, parent: Option<&str>, relevance_score: f64) {
        if !self.queued.insert(url.to_string()) {
            return;
        }
        self.frontier.push(CrawlNode {
            url: url.to_string(),
            depth,
            parent: parent.map(str::to_string),
            relevance_score,
            explored: false,
        });
    }

    /// Index of the most promising unexplored node.
    ///
    /// Relevance decides unless two nodes are within `tolerance`, then the
    /// shallower wins, then the more relevant, then the earlier queued.
    fn next_node(&self, tolerance: f64) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, node) in self.frontier.iter().enumerate() {
            if node.explored {
                continue;
            }
            match best {
                Some(current) if !prefer(node, &self.frontier[current], tolerance) => {}
                _ => best = Some(index),
            }
        }
        best
    }

    fn budget_left(&self, max_pages: usize) -> bool {
        self.outcome.visited.len() < max_pages
    }
}

fn prefer(candidate: &CrawlNode, current: &CrawlNode, tolerance: f64) -> bool {
    let gap = candidate.relevance_score - current.relevance_score;
    if gap.abs() > tolerance {
        return gap > 0.0;
    }
    if candidate.depth != current.depth {
        return candidate.depth < current.depth;
    }
    candidate.relevance_score > current.relevance_score
}

/// Best-first site crawler
pub struct IntelligentCrawler {
    fetcher: SharedFetcher,
    reports: SharedReportFinder,
    scrape: ScrapeRequest,
}

impl IntelligentCrawler {
    pub fn new(fetcher: SharedFetcher) -> Self {
        Self {
            fetcher,
            reports: Arc::new(NoReportFinder),
            scrape: ScrapeRequest::default(),
        }
    }

    /// Look up PDFs for reports named but not linked on crawled pages
    pub fn with_report_finder(mut self, reports: SharedReportFinder) -> Self {
        self.reports = reports;
        self
    }

    pub fn with_scrape_request(mut self, scrape: ScrapeRequest) -> Self {
        self.scrape = scrape;
        self
    }

    /// Crawl from `start_url`, returning post-processed results
    pub async fn crawl(
        &self,
        start_url: &str,
        query: &str,
        domain: &str,
        options: &CrawlOptions,
    ) -> Result<Vec<CrawlResult>, CrawlError> {
        Ok(self
            .crawl_detailed(start_url, query, domain, options)
            .await?
            .results)
    }

    /// Crawl from `start_url`, also reporting what was fetched
    pub async fn crawl_detailed(
        &self,
        start_url: &str,
        query: &str,
        domain: &str,
        options: &CrawlOptions,
    ) -> Result<CrawlOutcome, CrawlError> {
        self.fetcher
            .ensure_ready()
            .map_err(|e| CrawlError::Config(e.to_string()))?;

        let domain = if domain.trim().is_empty() {
            host_of(start_url).unwrap_or_default()
        } else {
            domain.trim().to_lowercase()
        };

        info!("Crawling {} (domain {}, budget {})", start_url, domain, options.max_pages);

        let mut run = CrawlRun::default();
        run.enqueue(start_url, 0, None, 1.0);

        while run.budget_left(options.max_pages) {
            let Some(index) = run.next_node(options.tie_tolerance) else {
                break;
            };
            run.frontier[index].explored = true;
            let node = run.frontier[index].clone();
            run.outcome.visited.push(node.url.clone());

            let page = match self.crawl_page(&node, query, &domain, options).await {
                Ok(page) => page,
                Err(e) => {
                    if let Some(fatal) = CrawlError::escalate(&e) {
                        return Err(fatal);
                    }
                    warn!("Failed to crawl {}: {}", node.url, e);
                    run.outcome.failed += 1;
                    continue;
                }
            };

            debug!(
                "Crawled {} (depth {}, relevance {:.2}, {} data points)",
                node.url,
                node.depth,
                page.relevance_score,
                page.data_points.len()
            );

            let ceiling = self.enqueue_links(&mut run, &node, &page, query, options);

            let files: Vec<String> = if options.include_files && node.depth < ceiling {
                page.file_links
                    .iter()
                    .filter(|url| is_pdf_url(url))
                    .cloned()
                    .collect()
            } else {
                Vec::new()
            };
            run.outcome.results.push(page);

            for file_url in files {
                if !run.budget_left(options.max_pages) {
                    break;
                }
                if !run.queued.insert(file_url.clone()) {
                    continue;
                }
                run.outcome.visited.push(file_url.clone());

                match self.crawl_file(&file_url, &node, query, options).await {
                    Ok(file) => run.outcome.results.push(file),
                    Err(e) => {
                        if let Some(fatal) = CrawlError::escalate(&e) {
                            return Err(fatal);
                        }
                        warn!("Failed to read document {}: {}", file_url, e);
                        run.outcome.failed += 1;
                    }
                }
            }
        }

        let mut outcome = run.outcome;
        outcome.results = post_process_results(outcome.results);

        info!(
            "Crawl of {} fetched {} URLs, kept {} results",
            start_url,
            outcome.visited.len(),
            outcome.results.len()
        );

        Ok(outcome)
    }

    async fn crawl_page(
        &self,
        node: &CrawlNode,
        query: &str,
        domain: &str,
        options: &CrawlOptions,
    ) -> Result<CrawlResult, FetchError> {
        let page = self.fetcher.scrape(&node.url, &self.scrape).await?;

        let data_points =
            extract_data_points(&page.markdown, &page.html, query, &options.data_patterns);
        let relevance_score = page_relevance(&page.markdown, query, &data_points);
        let links = extract_links(&page.html, &node.url, domain);

        let mut file_links = links.files;
        if options.include_files {
            for url in self.reports.find_reports(&page.markdown, query).await {
                if !file_links.contains(&url) {
                    file_links.push(url);
                }
            }
        }

        let mut metadata = Metadata::new();
        metadata.insert("contentType".into(), "webpage".into());
        metadata.insert("contentLength".into(), page.markdown.chars().count().into());
        metadata.insert("hasStructuredData".into(), (!data_points.is_empty()).into());
        metadata.insert("sourceType".into(), detect_source_type(&page.html).into());
        if let Some(parent) = &node.parent {
            metadata.insert("parent".into(), parent.clone().into());
        }

        let title = page
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| node.url.clone());

        Ok(CrawlResult {
            url: node.url.clone(),
            title,
            content: page.markdown,
            depth: node.depth,
            data_points,
            links: links.pages,
            file_links,
            relevance_score,
            metadata,
        })
    }

    async fn crawl_file(
        &self,
        url: &str,
        parent: &CrawlNode,
        query: &str,
        options: &CrawlOptions,
    ) -> Result<CrawlResult, FetchError> {
        let text = self.fetcher.fetch_pdf_text(url).await?;

        let data_points = extract_data_points(&text, "", query, &options.data_patterns);
        let relevance_score = page_relevance(&text, query, &data_points);

        let mut metadata = Metadata::new();
        metadata.insert("contentType".into(), "pdf".into());
        metadata.insert("fileType".into(), "pdf".into());
        metadata.insert("contentLength".into(), text.chars().count().into());
        metadata.insert("parent".into(), parent.url.clone().into());

        Ok(CrawlResult {
            url: url.to_string(),
            title: file_name(url).unwrap_or_else(|| url.to_string()),
            content: text,
            depth: parent.depth + 1,
            data_points,
            links: Vec::new(),
            file_links: Vec::new(),
            relevance_score,
            metadata,
        })
    }

    /// Queue the page's links and return the depth ceiling for its branch
    fn enqueue_links(
        &self,
        run: &mut CrawlRun,
        node: &CrawlNode,
        page: &CrawlResult,
        query: &str,
        options: &CrawlOptions,
    ) -> u32 {
        let adaptive = options.adaptive_depth && !page.data_points.is_empty();
        let ceiling = if adaptive {
            adaptive_depth(&page.data_points, page.relevance_score, options.max_depth)
        } else {
            options.max_depth
        };

        if !options.follow_links || node.depth >= ceiling {
            return ceiling;
        }

        if adaptive {
            let mut scored: Vec<(String, f64)> = page
                .links
                .iter()
                .filter(|url| !run.queued.contains(*url))
                .map(|url| (url.clone(), score_link_relevance(url, query, true)))
                .collect();
            scored.sort_by(|a, b| b.1.total_cmp(&a.1));

            for (url, score) in scored.into_iter().take(options.adaptive_links_per_page) {
                if score > options.relevance_threshold {
                    run.enqueue(&url, node.depth + 1, Some(&node.url), score);
                }
            }
        } else {
            let relevance = page.relevance_score * 0.8;
            let fresh: Vec<String> = page
                .links
                .iter()
                .filter(|url| !run.queued.contains(*url))
                .take(options.links_per_page)
                .cloned()
                .collect();

            for url in fresh {
                run.enqueue(&url, node.depth + 1, Some(&node.url), relevance);
            }
        }

        ceiling
    }
}

/// Relevance of page text to the query, in [0, 1].
///
/// Each query term adds 0.1 per occurrence (at most 1 per term), each data
/// point adds 0.2, and a data point with confidence above 0.8 adds 0.5.
pub fn page_relevance(content: &str, query: &str, data_points: &[DataPoint]) -> f64 {
    let lower = content.to_lowercase();
    let term_score: f64 = query_terms(query)
        .iter()
        .map(|term| (lower.matches(term.as_str()).count() as f64 * 0.1).min(1.0))
        .sum();

    let data_score = data_points.len() as f64 * 0.2;
    let confident = if data_points.iter().any(|dp| dp.confidence > 0.8) {
        0.5
    } else {
        0.0
    };

    (term_score + data_score + confident).min(1.0)
}

/// Depth ceiling for a branch whose page yielded `data_points`
pub fn adaptive_depth(data_points: &[DataPoint], relevance: f64, base: u32) -> u32 {
    let mut bonus = 0;
    if data_points.len() > 5 {
        bonus += 1;
    }
    if data_points.iter().any(|dp| dp.confidence > 0.9) {
        bonus += 1;
    }
    if relevance > 0.8 {
        bonus += 1;
    }
    (base + bonus).min(base * 2)
}

const DATA_URL_KEYWORDS: &[&str] = &["data", "stats", "report", "analysis", "research", "download"];

/// Promise of an unvisited link, judged by its URL alone
pub fn score_link_relevance(url: &str, query: &str, parent_has_data: bool) -> f64 {
    let lower = url.to_lowercase();
    let mut score = 0.5;

    score += query_terms(query)
        .iter()
        .filter(|term| lower.contains(term.as_str()))
        .count() as f64
        * 0.1;
    score += DATA_URL_KEYWORDS
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .count() as f64
        * 0.1;
    if parent_has_data {
        score += 0.2;
    }

    score.min(1.0)
}

/// Deduplicate data points across results and rank the results.
///
/// For each (value, type) the highest-confidence instance survives (the first
/// one on ties); every other instance is dropped from its result. Results are
/// then ordered by data point count, then relevance. Applying this twice gives
/// the same output as applying it once.
pub fn post_process_results(mut results: Vec<CrawlResult>) -> Vec<CrawlResult> {
    let mut winners: HashMap<(String, DataPointType), (usize, usize, f64)> = HashMap::new();

    for (ri, result) in results.iter().enumerate() {
        for (di, dp) in result.data_points.iter().enumerate() {
            let key = (dp.value.clone(), dp.data_type);
            match winners.get(&key) {
                Some(&(_, _, confidence)) if dp.confidence <= confidence => {}
                _ => {
                    winners.insert(key, (ri, di, dp.confidence));
                }
            }
        }
    }

    for (ri, result) in results.iter_mut().enumerate() {
        let mut di = 0;
        result.data_points.retain(|dp| {
            let keep = winners
                .get(&(dp.value.clone(), dp.data_type))
                .is_some_and(|&(wr, wd, _)| wr == ri && wd == di);
            di += 1;
            keep
        });
    }

    results.sort_by(|a, b| {
        b.data_points
            .len()
            .cmp(&a.data_points.len())
            .then_with(|| b.relevance_score.total_cmp(&a.relevance_score))
    });

    results
}
