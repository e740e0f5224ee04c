//! Fathom Research
//!
//! The research components behind a deep search:
//! - **Strategies**: concurrent search strategies merged into one ranked set
//! - **Crawler**: best-first site crawling with adaptive depth
//! - **Quality**: multi-dimensional scoring and cross-source corroboration
//! - **Discovery**: finding PDFs for reports a page names but does not link
//!
//! The language-model backend is optional and only used for discovery.

pub mod backend;
pub mod crawler;
pub mod discovery;
pub mod quality;
pub mod strategies;

#[cfg(test)]
mod testing;

pub use backend::*;
pub use crawler::*;
pub use discovery::*;
pub use quality::*;
pub use strategies::*;
