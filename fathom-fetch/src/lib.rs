//! Fathom Fetch Layer
//!
//! Provides the web access used by research runs:
//! - HTTP clients and collaborator failure classification
//! - Search/scrape collaborator seam with a Firecrawl implementation
//! - In-domain link discovery and page text extraction
//! - PDF download and text extraction

pub mod client;
pub mod files;
pub mod firecrawl;
pub mod links;

pub use client::*;
pub use files::*;
pub use firecrawl::*;
pub use links::*;
