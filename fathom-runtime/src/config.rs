//! File configuration
//!
//! An optional `fathom.toml` overrides pipeline defaults. Every table and
//! field is optional:
//!
//! ```toml
//! [search]
//! broad_limit = 40
//! seeds = 5
//! top_n = 10
//! time_budget_secs = 300
//!
//! [crawl]
//! max_depth = 2
//! pages_per_seed = 10
//! tie_tolerance = 0.1
//!
//! [scoring]
//! corroboration_variance = 0.05
//!
//! [scoring.weights]
//! authority = 0.25
//! freshness = 0.15
//! completeness = 0.20
//! accuracy = 0.25
//! relevance = 0.15
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use fathom_core::{ScoreWeights, DEFAULT_CORROBORATION_VARIANCE, DEFAULT_TIE_TOLERANCE};
use fathom_research::{CrawlOptions, ScoringConfig};

use crate::DeepSearchOptions;

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "fathom.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FathomConfig {
    pub search: SearchSection,
    pub crawl: CrawlSection,
    pub scoring: ScoringSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub broad_limit: usize,
    pub seeds: usize,
    pub top_n: usize,
    pub time_budget_secs: u64,
    pub sector: Option<String>,
    pub multi_strategy: bool,
    pub quality_scoring: bool,
    pub intelligent_crawling: bool,
    pub include_files: bool,
    pub include_spreadsheets: bool,
    pub include_databases: bool,
}

impl Default for SearchSection {
    fn default() -> Self {
        let defaults = DeepSearchOptions::default();
        Self {
            broad_limit: defaults.broad_limit,
            seeds: defaults.seed_count,
            top_n: defaults.top_n,
            time_budget_secs: defaults.time_budget.as_secs(),
            sector: None,
            multi_strategy: defaults.use_multi_strategy,
            quality_scoring: defaults.use_quality_scoring,
            intelligent_crawling: defaults.use_intelligent_crawling,
            include_files: defaults.include_files,
            include_spreadsheets: defaults.include_spreadsheets,
            include_databases: defaults.include_databases,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlSection {
    pub max_depth: u32,
    pub pages_per_seed: usize,
    pub follow_links: bool,
    pub adaptive_depth: bool,
    pub relevance_threshold: f64,
    pub tie_tolerance: f64,
    pub links_per_page: usize,
    pub adaptive_links_per_page: usize,
}

impl Default for CrawlSection {
    fn default() -> Self {
        let crawl = CrawlOptions::default();
        Self {
            max_depth: crawl.max_depth,
            pages_per_seed: DeepSearchOptions::default().pages_per_seed,
            follow_links: crawl.follow_links,
            adaptive_depth: crawl.adaptive_depth,
            relevance_threshold: crawl.relevance_threshold,
            tie_tolerance: DEFAULT_TIE_TOLERANCE,
            links_per_page: crawl.links_per_page,
            adaptive_links_per_page: crawl.adaptive_links_per_page,
        }
    }
}

/// Weights only make sense as a complete set, so `[scoring.weights]` needs all five
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    pub weights: Option<ScoreWeights>,
    pub corroboration_variance: f64,
    pub verified_ratio: f64,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            weights: None,
            corroboration_variance: DEFAULT_CORROBORATION_VARIANCE,
            verified_ratio: ScoringConfig::default().verified_ratio,
        }
    }
}

impl FathomConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, else `fathom.toml` if present, else defaults
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::load(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn deep_search_options(&self) -> DeepSearchOptions {
        let search = &self.search;
        DeepSearchOptions {
            max_depth: self.crawl.max_depth,
            include_files: search.include_files,
            include_spreadsheets: search.include_spreadsheets,
            include_databases: search.include_databases,
            target_data_points: Vec::new(),
            sector: search.sector.clone(),
            broad_limit: search.broad_limit,
            seed_count: search.seeds,
            pages_per_seed: self.crawl.pages_per_seed,
            top_n: search.top_n,
            time_budget: Duration::from_secs(search.time_budget_secs),
            use_multi_strategy: search.multi_strategy,
            use_quality_scoring: search.quality_scoring,
            use_intelligent_crawling: search.intelligent_crawling,
        }
    }

    /// Crawl tuning shared by every seed
    pub fn crawl_options(&self) -> CrawlOptions {
        let crawl = &self.crawl;
        CrawlOptions {
            follow_links: crawl.follow_links,
            adaptive_depth: crawl.adaptive_depth,
            relevance_threshold: crawl.relevance_threshold,
            tie_tolerance: crawl.tie_tolerance,
            links_per_page: crawl.links_per_page,
            adaptive_links_per_page: crawl.adaptive_links_per_page,
            ..CrawlOptions::default()
        }
    }

    pub fn scoring_config(&self) -> ScoringConfig {
        let mut config = ScoringConfig::default().with_variance(self.scoring.corroboration_variance);
        if let Some(weights) = self.scoring.weights {
            config = config.with_weights(weights);
        }
        config.verified_ratio = self.scoring.verified_ratio;
        config
    }
}
