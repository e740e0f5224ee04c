//! Fathom Runtime
//!
//! Runs the deep search pipeline end to end:
//! - [`DeepSearch`]: broad search, scoring, seed crawling, re-scoring, ranking
//! - [`perform_deep_search`]: one-call entry point from credentials
//! - [`FathomConfig`]: optional `fathom.toml` overrides

pub mod config;
pub mod deep_search;

pub use config::*;
pub use deep_search::*;
