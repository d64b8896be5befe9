use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::models::{Constraint, Query, Relation};
use crate::utils::error::{AppError, Result};

/// Where the pipeline gets its queries from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryStore: Send + Sync {
    async fn fetch_queries(&self) -> Result<Vec<Query>>;
    async fn update_queries(&self, queries: Vec<Query>) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct QueryEntry {
    #[serde(default)]
    id: u32,
    query_string: String,
    #[serde(default = "default_asciize")]
    asciize: bool,
    #[serde(default)]
    constraint_list: Vec<ConstraintEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConstraintEntry {
    #[serde(default)]
    id: u32,
    key: String,
    value: String,
    relation: Relation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    asciize: Option<bool>,
}

fn default_asciize() -> bool {
    true
}

impl From<QueryEntry> for Query {
    fn from(entry: QueryEntry) -> Self {
        let normalize = entry.asciize;
        let constraints = entry
            .constraint_list
            .into_iter()
            .map(|c| Constraint {
                id: c.id,
                attribute_key: c.key,
                comparison_value: c.value,
                relation: c.relation,
                normalize: c.asciize.unwrap_or(normalize),
            })
            .collect();

        Query {
            id: entry.id,
            query_string: entry.query_string,
            constraints,
            normalize,
        }
    }
}

impl From<&Query> for QueryEntry {
    fn from(query: &Query) -> Self {
        Self {
            id: query.id,
            query_string: query.query_string.clone(),
            asciize: query.normalize,
            constraint_list: query
                .constraints
                .iter()
                .map(|c| ConstraintEntry {
                    id: c.id,
                    key: c.attribute_key.clone(),
                    value: c.comparison_value.clone(),
                    relation: c.relation,
                    asciize: Some(c.normalize),
                })
                .collect(),
        }
    }
}

/// Queries kept in a YAML list on disk.
pub struct YamlQueryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl YamlQueryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, err: impl std::fmt::Display) -> AppError {
        AppError::QueriesUnavailable(format!("{}: {}", self.path.display(), err))
    }
}

#[async_trait]
impl QueryStore for YamlQueryStore {
    async fn fetch_queries(&self) -> Result<Vec<Query>> {
        let _guard = self.lock.lock().await;

        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.unavailable(e))?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<QueryEntry> = serde_yaml::from_str(&raw).map_err(|e| self.unavailable(e))?;
        let queries: Vec<Query> = entries.into_iter().map(Query::from).collect();

        tracing::debug!("Loaded {} queries from {}", queries.len(), self.path.display());
        Ok(queries)
    }

    async fn update_queries(&self, queries: Vec<Query>) -> Result<()> {
        let _guard = self.lock.lock().await;

        let entries: Vec<QueryEntry> = queries.iter().map(QueryEntry::from).collect();
        let body = serde_yaml::to_string(&entries)
            .map_err(|e| AppError::InvalidConfig(format!("cannot serialize queries: {}", e)))?;

        let tmp = self.path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::info!("Saved {} queries to {}", queries.len(), self.path.display());
        Ok(())
    }
}
