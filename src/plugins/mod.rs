//! Scraper plugins: the `Scraper` capability, the built-in marketplace kinds
//! and the registry that instantiates them from manifest files.

pub mod http;
pub mod registry;
pub mod scrapers;
pub mod traits;

pub use registry::{Discovered, ScraperBox, ScraperContext, ScraperFactory, ScraperRegistry};
pub use traits::Scraper;
