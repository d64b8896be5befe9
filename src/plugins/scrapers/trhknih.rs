use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

use super::{element_text, parse_items};
use crate::models::Record;
use crate::plugins::http::fetch_page;
use crate::plugins::registry::{ScraperBox, ScraperContext};
use crate::plugins::traits::Scraper;
use crate::utils::error::{AppError, Result};

pub const BASE_URL: &str = "https://www.trhknih.cz";

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static ITEM: LazyLock<Selector> = LazyLock::new(|| selector("div.serp-item"));
static DETAIL: LazyLock<Selector> = LazyLock::new(|| selector("div.span6 p"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("a"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| selector("span.ask-count.label.label-success"));
static YEAR: LazyLock<Selector> = LazyLock::new(|| selector("em"));
static ACTIVE_PAGE: LazyLock<Selector> = LazyLock::new(|| selector("div.pagination li.active"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a"));

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    base_url: Option<String>,
}

/// Searches the trhknih.cz second-hand book market.
pub struct TrhknihScraper {
    client: Client,
    base_url: Url,
    identifier: String,
}

impl TrhknihScraper {
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::InvalidConfig(format!("invalid base_url '{}': {}", base_url, e)))?;
        Ok(Self {
            client,
            identifier: base_url.as_str().trim_end_matches('/').to_string(),
            base_url,
        })
    }

    /// Manifest keys: `base_url` (optional, defaults to the live site).
    pub fn from_manifest(table: &toml::Table, ctx: &ScraperContext) -> Result<ScraperBox> {
        let manifest: Manifest = toml::Value::Table(table.clone())
            .try_into()
            .map_err(|e| AppError::InvalidConfig(e.to_string()))?;
        let base_url = manifest.base_url.as_deref().unwrap_or(BASE_URL);
        Ok(Box::new(Self::new(ctx.client.clone(), base_url)?))
    }

    fn search_url(&self, query: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join("hledat")
            .map_err(|e| AppError::network(self.base_url.as_str(), e))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("type", "issue")
            .append_pair("chap", "1");
        Ok(url)
    }

    fn parse_page(&self, body: &str) -> (Vec<Record>, Option<Url>) {
        let document = Html::parse_document(body);
        let records = parse_items(&self.identifier, document.select(&ITEM), |item| self.parse_item(item));
        let next = self.next_page(&document);
        (records, next)
    }

    fn parse_item(&self, item: ElementRef<'_>) -> Result<Record> {
        let detail = item
            .select(&DETAIL)
            .next()
            .ok_or_else(|| AppError::SkipRecord("listing without detail paragraph".into()))?;
        let title = detail
            .select(&TITLE)
            .next()
            .ok_or_else(|| AppError::SkipRecord("listing without title link".into()))?;
        let year = detail
            .select(&YEAR)
            .next()
            .ok_or_else(|| AppError::SkipRecord(format!("'{}' has no issue year", element_text(title))))?;

        let link = title
            .value()
            .attr("href")
            .and_then(|href| self.base_url.join(href.trim()).ok())
            .map(String::from)
            .unwrap_or_default();

        let price = detail.select(&PRICE).next().map(element_text).unwrap_or_default();

        let publisher = year
            .next_siblings()
            .find_map(ElementRef::wrap)
            .map(element_text)
            .unwrap_or_default();

        // the author is a bare text node somewhere before the year
        let author = year
            .prev_siblings()
            .filter_map(|node| match node.value() {
                Node::Text(text) => Some(text.trim().to_string()),
                _ => None,
            })
            .find(|text| !text.is_empty())
            .unwrap_or_default();

        Ok(Record {
            name: element_text(title),
            author,
            price,
            publisher,
            issue_year: element_text(year),
            link,
            ..Default::default()
        })
    }

    fn next_page(&self, document: &Html) -> Option<Url> {
        let active = document.select(&ACTIVE_PAGE).next()?;
        let next = active
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "li")?;

        if next.value().classes().any(|class| class == "disabled") {
            return None;
        }

        let href = next.select(&ANCHOR).next()?.value().attr("href")?;
        self.base_url.join(href.trim()).ok()
    }
}

#[async_trait]
impl Scraper for TrhknihScraper {
    fn base_identifier(&self) -> &str {
        &self.identifier
    }

    async fn get_results(&self, query: &str) -> Result<Vec<Record>> {
        let mut results = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(self.search_url(query)?);

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                tracing::warn!(scraper = %self.identifier, "Pagination loops back to {}, stopping", url);
                break;
            }

            let body = fetch_page(&self.client, &url).await?;
            let (records, next_url) = self.parse_page(&body);
            tracing::debug!(scraper = %self.identifier, "{} listings on {}", records.len(), url);

            results.extend(records);
            next = next_url;
        }

        Ok(results)
    }
}
