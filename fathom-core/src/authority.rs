//! Known-authority source registry
//!
//! Institutional categories and the domains seeded into every quality store.

use serde::{Deserialize, Serialize};

/// Institutional category of a source domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    Government,
    ResearchFirm,
    IndustryAssociation,
    Academic,
}

impl SourceCategory {
    /// Authority weight of the category
    pub fn authority(&self) -> f64 {
        match self {
            SourceCategory::Government => 0.95,
            SourceCategory::ResearchFirm => 0.85,
            SourceCategory::IndustryAssociation => 0.80,
            SourceCategory::Academic => 0.85,
        }
    }
}

/// A domain with a known institutional category
#[derive(Debug, Clone, Serialize)]
pub struct KnownSource {
    pub domain: &'static str,
    pub category: SourceCategory,
}

impl KnownSource {
    pub fn authority(&self) -> f64 {
        self.category.authority()
    }
}

const fn source(domain: &'static str, category: SourceCategory) -> KnownSource {
    KnownSource { domain, category }
}

/// Default known-authority table
pub static KNOWN_SOURCES: &[KnownSource] = &[
    source("census.gov", SourceCategory::Government),
    source("bls.gov", SourceCategory::Government),
    source("bea.gov", SourceCategory::Government),
    source("fda.gov", SourceCategory::Government),
    source("cdc.gov", SourceCategory::Government),
    source("cms.gov", SourceCategory::Government),
    source("eia.gov", SourceCategory::Government),
    source("fred.stlouisfed.org", SourceCategory::Government),
    source("gartner.com", SourceCategory::ResearchFirm),
    source("idc.com", SourceCategory::ResearchFirm),
    source("iqvia.com", SourceCategory::ResearchFirm),
    source("nielsen.com", SourceCategory::ResearchFirm),
    source("americanchemistry.com", SourceCategory::IndustryAssociation),
    source("aha.org", SourceCategory::IndustryAssociation),
    source("phrma.org", SourceCategory::IndustryAssociation),
    source("steel.org", SourceCategory::IndustryAssociation),
    source("nber.org", SourceCategory::Academic),
    source("jstor.org", SourceCategory::Academic),
    source("nature.com", SourceCategory::Academic),
    source("sciencedirect.com", SourceCategory::Academic),
];

/// Host followed by each parent domain, stopping before the bare TLD
///
/// `data.bls.gov` yields `data.bls.gov`, `bls.gov`.
pub fn domain_candidates(host: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut rest = host;
    while rest.contains('.') {
        candidates.push(rest);
        match rest.find('.') {
            Some(idx) => rest = &rest[idx + 1..],
            None => break,
        }
    }
    candidates
}

/// Authority floor implied by the top-level domain
pub fn tld_floor(host: &str) -> Option<f64> {
    if host.ends_with(".gov") {
        Some(0.95)
    } else if host.ends_with(".edu") {
        Some(0.85)
    } else if host.ends_with(".org") || host.contains(".org.") {
        Some(0.75)
    } else {
        None
    }
}
