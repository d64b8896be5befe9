//! One pipeline run: load queries, discover scrapers, collect, mail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::mailer::{DeliveryReport, Mailer};
use crate::models::Record;
use crate::pipeline;
use crate::plugins::ScraperRegistry;
use crate::store::{ConfigStore, QueryStore};
use crate::utils::error::Result;

/// How a spawned run ended, reported back to the scheduler.
#[derive(Debug)]
pub struct TaskOutcome {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub result: Result<DeliveryReport>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Task {
    config: Arc<ConfigStore>,
    queries: Arc<dyn QueryStore>,
    registry: Arc<ScraperRegistry>,
    scrapers_dir: PathBuf,
    mailer: Arc<dyn Mailer>,
}

impl Task {
    pub fn new(
        config: Arc<ConfigStore>,
        queries: Arc<dyn QueryStore>,
        registry: Arc<ScraperRegistry>,
        scrapers_dir: impl Into<PathBuf>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config,
            queries,
            registry,
            scrapers_dir: scrapers_dir.into(),
            mailer,
        }
    }

    /// Fetch queries, discover scrapers and return the matching records.
    pub async fn collect(&self) -> Result<Vec<Record>> {
        let queries = self.queries.fetch_queries().await?;
        tracing::info!("Loaded {} queries", queries.len());

        let scrapers = self.registry.discover(&self.scrapers_dir)?;
        pipeline::collect(&queries, &scrapers).await
    }

    /// Collect and mail the results.
    pub async fn run(&self) -> Result<DeliveryReport> {
        let records = self.collect().await?;
        let keys = self.config.get_mailer_keys()?;
        self.mailer.send(&records, &keys).await
    }
}

/// Something the scheduler can fire.
#[async_trait]
pub trait Job: Send + Sync {
    async fn execute(&self) -> TaskOutcome;
}

#[async_trait]
impl Job for Task {
    /// Run with a fresh run id, logging the result.
    async fn execute(&self) -> TaskOutcome {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let span = tracing::info_span!("run", %run_id);

        metrics::counter!("aw_runs_started_total").increment(1);

        let result = async {
            tracing::info!("Run started");
            let result = self.run().await;
            match &result {
                Ok(report) => {
                    metrics::counter!("aw_runs_succeeded_total").increment(1);
                    tracing::info!(
                        "Run finished: {} records sent to {}",
                        report.record_count,
                        report.recipient
                    );
                }
                Err(e) => {
                    metrics::counter!("aw_runs_failed_total").increment(1);
                    tracing::error!(stage = e.stage(), class = ?e.class(), "Run failed: {}", e);
                }
            }
            result
        }
        .instrument(span)
        .await;

        TaskOutcome {
            run_id,
            started_at,
            elapsed: start.elapsed(),
            result,
        }
    }
}
