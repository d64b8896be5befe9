use serde::{Deserialize, Serialize};

/// Language stated for a listing when the marketplace does not give one.
pub const DEFAULT_LANGUAGE: &str = "Neuvedeno";

/// A single listing scraped from a marketplace.
///
/// Every field is kept as text; marketplaces format prices and years
/// inconsistently, so numeric interpretation happens only at comparison time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub author: String,
    pub price: String,
    pub publisher: String,
    pub issue_year: String,
    pub link: String,
    pub language: String,
}

impl Record {
    /// Field names a constraint may target.
    pub const ATTRIBUTES: [&'static str; 7] = [
        "name",
        "author",
        "price",
        "publisher",
        "issue_year",
        "link",
        "language",
    ];

    /// Look up a field by its attribute name.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match key {
            "name" => Some(&self.name),
            "author" => Some(&self.author),
            "price" => Some(&self.price),
            "publisher" => Some(&self.publisher),
            "issue_year" => Some(&self.issue_year),
            "link" => Some(&self.link),
            "language" => Some(&self.language),
            _ => None,
        }
    }

    pub fn has_attribute(key: &str) -> bool {
        Self::ATTRIBUTES.contains(&key)
    }
}

impl Default for Record {
    fn default() -> Self {
        Self {
            name: String::new(),
            author: String::new(),
            price: String::new(),
            publisher: String::new(),
            issue_year: String::new(),
            link: String::new(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}: {}", self.author, self.name, self.price)
    }
}
