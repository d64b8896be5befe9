use futures::future::try_join_all;

use crate::engine::filter;
use crate::models::{Query, Record};
use crate::plugins::ScraperBox;
use crate::utils::error::{AppError, Result};

/// Fail on the first constraint that names a field records do not have.
pub fn check_attributes(queries: &[Query]) -> Result<()> {
    for query in queries {
        if let Some(key) = query.unknown_attributes().first() {
            tracing::error!(query = %query.query_string, "Constraint targets unknown attribute {}", key);
            return Err(AppError::UnknownAttribute { key: key.to_string() });
        }
    }
    Ok(())
}

/// Run every scraper for every query and keep what the query's constraints
/// accept.
///
/// Queries are processed one after another. Within a query the scrapers run
/// concurrently, but their results are joined in registration order.
pub async fn collect(queries: &[Query], scrapers: &[ScraperBox]) -> Result<Vec<Record>> {
    check_attributes(queries)?;

    let mut results = Vec::new();

    for query in queries {
        let searches = scrapers.iter().map(|scraper| async move {
            scraper.get_results(&query.query_string).await.inspect_err(|e| {
                tracing::error!(
                    scraper = scraper.base_identifier(),
                    query = %query.query_string,
                    "Scraper failed: {}",
                    e
                );
            })
        });

        let records: Vec<Record> = try_join_all(searches).await?.into_iter().flatten().collect();
        let scraped = records.len();
        metrics::counter!("aw_records_scraped_total").increment(scraped as u64);

        let kept = filter(records, &query.constraints)?;
        tracing::info!(
            query = %query.query_string,
            "{} of {} listings matched",
            kept.len(),
            scraped
        );

        results.extend(kept);
    }

    Ok(results)
}
