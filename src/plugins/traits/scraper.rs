use async_trait::async_trait;

use crate::models::Record;
use crate::utils::error::Result;

/// A marketplace that can be searched for listings.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Stable identifier for logs, usually the marketplace's base URL.
    fn base_identifier(&self) -> &str;

    /// Every listing the marketplace returns for `query`, across all result
    /// pages. Malformed listings are dropped; a failed request fails the call.
    async fn get_results(&self, query: &str) -> Result<Vec<Record>>;
}
