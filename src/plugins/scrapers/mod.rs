//! Built-in scraper kinds.

pub mod css;
pub mod trhknih;

pub use css::CssScraper;
pub use trhknih::TrhknihScraper;

use scraper::ElementRef;

use crate::models::Record;
use crate::utils::error::Result;

/// Visible text of an element with runs of whitespace collapsed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse every item of a page, dropping the ones that fail.
pub(crate) fn parse_items<'a, I, F>(source: &str, items: I, parse: F) -> Vec<Record>
where
    I: IntoIterator<Item = ElementRef<'a>>,
    F: Fn(ElementRef<'a>) -> Result<Record>,
{
    let mut records = Vec::new();

    for item in items {
        match parse(item) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(scraper = source, "{}", e);
                metrics::counter!("aw_records_skipped_total").increment(1);
            }
        }
    }

    records
}
