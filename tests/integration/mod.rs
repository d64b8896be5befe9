// Shared fixtures for the integration tests

pub mod pipeline_tests;
pub mod scheduler_tests;
pub mod store_tests;

use async_trait::async_trait;
use chrono::Local;
use std::path::Path;
use std::sync::{Arc, Mutex};

use antique_watchdog::config::AppConfig;
use antique_watchdog::mailer::{DeliveryReport, Mailer};
use antique_watchdog::plugins::{Scraper, ScraperBox, ScraperContext, ScraperRegistry};
use antique_watchdog::store::{ConfigStore, MailerKeys, Settings, YamlQueryStore};
use antique_watchdog::{Record, Result, Task};

pub const EGAN_QUERIES: &str = r#"
- id: 1
  query_string: egan
  constraint_list:
    - id: 1
      key: author
      value: egan
      relation: in
"#;

/// Scraper returning the same listings for every query.
pub struct Shelf {
    pub records: Vec<Record>,
}

#[async_trait]
impl Scraper for Shelf {
    fn base_identifier(&self) -> &str {
        "shelf"
    }

    async fn get_results(&self, _query: &str) -> Result<Vec<Record>> {
        Ok(self.records.clone())
    }
}

/// Mailer that keeps what it was asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Vec<Record>>>,
}

impl RecordingMailer {
    pub fn deliveries(&self) -> Vec<Vec<Record>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, records: &[Record], keys: &MailerKeys) -> Result<DeliveryReport> {
        self.sent.lock().unwrap().push(records.to_vec());
        Ok(DeliveryReport {
            recipient: keys.recipient.clone(),
            record_count: records.len(),
            sent_at: Local::now(),
        })
    }
}

pub fn book(name: &str, author: &str) -> Record {
    Record {
        name: name.to_string(),
        author: author.to_string(),
        ..Default::default()
    }
}

pub fn shelf_books() -> Vec<Record> {
    vec![book("Diaspora", "Greg Egan"), book("Krakatit", "Karel Čapek")]
}

pub fn valid_settings() -> Settings {
    Settings {
        login: "watchdog@example.com".into(),
        password: "secret".into(),
        recipient: "reader@example.com".into(),
        server: "smtp.example.com".into(),
        port: "465".into(),
        time: "14:30".into(),
        period: "daily".into(),
        weekday: "".into(),
    }
}

/// Registry knowing only the `shelf` kind, which serves `records`.
pub fn shelf_registry(records: Vec<Record>) -> ScraperRegistry {
    let context = ScraperContext::new(reqwest::Client::new(), AppConfig::default().scraper);
    let mut registry = ScraperRegistry::new(context);
    registry.register_factory("shelf", move |_table: &toml::Table, _ctx: &ScraperContext| {
        Ok(Box::new(Shelf {
            records: records.clone(),
        }) as ScraperBox)
    });
    registry
}

/// Lay out a scrapers directory and a queries file under `root`.
pub fn write_workspace(root: &Path, queries: &str) {
    let scrapers = root.join("scrapers");
    std::fs::create_dir_all(&scrapers).unwrap();
    std::fs::write(scrapers.join("shelf.toml"), "[[scraper]]\nkind = \"shelf\"\n").unwrap();
    std::fs::write(root.join("queries.yaml"), queries).unwrap();
}

pub fn build_task(root: &Path, config: Arc<ConfigStore>, mailer: Arc<RecordingMailer>) -> Arc<Task> {
    Arc::new(Task::new(
        config,
        Arc::new(YamlQueryStore::new(root.join("queries.yaml"))),
        Arc::new(shelf_registry(shelf_books())),
        root.join("scrapers"),
        mailer,
    ))
}

/// Poll `condition` until it holds or `timeout_ms` passes.
pub async fn wait_for<F>(mut condition: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    condition()
}
