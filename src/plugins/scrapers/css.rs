//! A marketplace described entirely by its manifest: where to search and
//! which CSS selectors pick out each listing field.
//!
//! ```toml
//! [[scraper]]
//! kind = "css"
//! base_url = "https://antikvariat.example"
//! search_path = "/search?q={query}"
//! item_selector = "article.book"
//! next_page_selector = "a.next"
//! required = ["name", "link"]
//!
//! [scraper.fields]
//! name = "h2 a"
//! author = ".author"
//! price = ".price"
//! link = "h2 a"
//! ```

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use url::Url;

use super::{element_text, parse_items};
use crate::models::{Record, DEFAULT_LANGUAGE};
use crate::plugins::http::fetch_page;
use crate::plugins::registry::{ScraperBox, ScraperContext};
use crate::plugins::traits::Scraper;
use crate::utils::error::{AppError, Result};

const QUERY_PLACEHOLDER: &str = "{query}";

#[derive(Debug, Deserialize)]
struct Manifest {
    base_url: String,
    search_path: String,
    item_selector: String,
    #[serde(default)]
    next_page_selector: Option<String>,
    #[serde(default = "default_required")]
    required: Vec<String>,
    fields: BTreeMap<String, String>,
}

fn default_required() -> Vec<String> {
    vec!["name".to_string()]
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::InvalidConfig(format!("invalid selector '{}': {:?}", css, e)))
}

pub struct CssScraper {
    client: Client,
    base_url: Url,
    identifier: String,
    search_path: String,
    item: Selector,
    next_page: Option<Selector>,
    fields: Vec<(String, Selector)>,
    required: Vec<String>,
}

impl CssScraper {
    pub fn from_manifest(table: &toml::Table, ctx: &ScraperContext) -> Result<ScraperBox> {
        let manifest: Manifest = toml::Value::Table(table.clone())
            .try_into()
            .map_err(|e| AppError::InvalidConfig(e.to_string()))?;
        Ok(Box::new(Self::build(ctx.client.clone(), manifest)?))
    }

    fn build(client: Client, manifest: Manifest) -> Result<Self> {
        let base_url = Url::parse(&manifest.base_url).map_err(|e| {
            AppError::InvalidConfig(format!("invalid base_url '{}': {}", manifest.base_url, e))
        })?;

        if !manifest.search_path.contains(QUERY_PLACEHOLDER) {
            return Err(AppError::InvalidConfig(format!(
                "search_path '{}' has no {} placeholder",
                manifest.search_path, QUERY_PLACEHOLDER
            )));
        }

        let mut fields = Vec::with_capacity(manifest.fields.len());
        for (key, css) in &manifest.fields {
            if !Record::has_attribute(key) {
                return Err(AppError::UnknownAttribute { key: key.clone() });
            }
            fields.push((key.clone(), parse_selector(css)?));
        }

        if let Some(missing) = manifest
            .required
            .iter()
            .find(|key| !manifest.fields.contains_key(key.as_str()))
        {
            return Err(AppError::InvalidConfig(format!(
                "required field '{}' has no selector",
                missing
            )));
        }

        Ok(Self {
            client,
            identifier: base_url.as_str().trim_end_matches('/').to_string(),
            base_url,
            search_path: manifest.search_path,
            item: parse_selector(&manifest.item_selector)?,
            next_page: manifest
                .next_page_selector
                .as_deref()
                .map(parse_selector)
                .transpose()?,
            fields,
            required: manifest.required,
        })
    }

    fn search_url(&self, query: &str) -> Result<Url> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let path = self.search_path.replace(QUERY_PLACEHOLDER, &encoded);
        self.base_url
            .join(&path)
            .map_err(|e| AppError::network(self.base_url.as_str(), e))
    }

    fn parse_page(&self, body: &str, page_url: &Url) -> (Vec<Record>, Option<Url>) {
        let document = Html::parse_document(body);
        let records = parse_items(&self.identifier, document.select(&self.item), |item| {
            self.parse_item(item, page_url)
        });

        let next = self.next_page.as_ref().and_then(|selector| {
            let href = document.select(selector).next()?.value().attr("href")?;
            page_url.join(href.trim()).ok()
        });

        (records, next)
    }

    fn parse_item(&self, item: ElementRef<'_>, page_url: &Url) -> Result<Record> {
        let mut record = Record::default();

        for (key, selector) in &self.fields {
            let Some(element) = item.select(selector).next() else {
                continue;
            };

            let value = if key == "link" {
                element
                    .value()
                    .attr("href")
                    .and_then(|href| page_url.join(href.trim()).ok())
                    .map(String::from)
                    .unwrap_or_default()
            } else {
                element_text(element)
            };

            set_field(&mut record, key, value);
        }

        if let Some(missing) = self
            .required
            .iter()
            .find(|key| record.attribute(key).is_none_or(str::is_empty))
        {
            return Err(AppError::SkipRecord(format!("listing has no {}", missing)));
        }

        if record.language.is_empty() {
            record.language = DEFAULT_LANGUAGE.to_string();
        }

        Ok(record)
    }
}

fn set_field(record: &mut Record, key: &str, value: String) {
    match key {
        "name" => record.name = value,
        "author" => record.author = value,
        "price" => record.price = value,
        "publisher" => record.publisher = value,
        "issue_year" => record.issue_year = value,
        "link" => record.link = value,
        "language" => record.language = value,
        _ => {}
    }
}

#[async_trait]
impl Scraper for CssScraper {
    fn base_identifier(&self) -> &str {
        &self.identifier
    }

    async fn get_results(&self, query: &str) -> Result<Vec<Record>> {
        let mut results = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(self.search_url(query)?);

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                break;
            }

            let body = fetch_page(&self.client, &url).await?;
            let (records, next_url) = self.parse_page(&body, &url);
            tracing::debug!(scraper = %self.identifier, "{} listings on {}", records.len(), url);

            results.extend(records);
            next = next_url;
        }

        Ok(results)
    }
}
