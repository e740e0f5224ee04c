//! Fathom Core - data model and extraction for deep web research
//!
//! This crate provides the foundational primitives:
//! - Typed data points and the best-effort extractor
//! - Search, crawl and scored result records
//! - Known-authority source registry
//! - Quality store shared across research runs

pub mod datapoints;
pub mod results;
pub mod authority;
pub mod store;
pub mod text;

pub use datapoints::*;
pub use results::*;
pub use authority::*;
pub use store::*;
pub use text::*;

/// Authority score for domains with no known category
pub const DEFAULT_AUTHORITY: f64 = 0.5;

/// Relative tolerance for two numeric data points to count as the same fact
pub const DEFAULT_CORROBORATION_VARIANCE: f64 = 0.05;

/// Relevance gap within which crawl frontier nodes count as tied
pub const DEFAULT_TIE_TOLERANCE: f64 = 0.1;
