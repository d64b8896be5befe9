use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;

use super::scrapers::{CssScraper, TrhknihScraper};
use super::traits::Scraper;
use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

pub type ScraperBox = Box<dyn Scraper>;

/// Builds one scraper from its `[[scraper]]` manifest table.
pub type ScraperFactory = Arc<dyn Fn(&toml::Table, &ScraperContext) -> Result<ScraperBox> + Send + Sync>;

const MANIFEST_EXTENSION: &str = "toml";

/// What every factory gets besides its own manifest table.
#[derive(Clone)]
pub struct ScraperContext {
    pub client: Client,
    pub config: ScraperConfig,
}

impl ScraperContext {
    pub fn new(client: Client, config: ScraperConfig) -> Self {
        Self { client, config }
    }
}

/// A scraper found during discovery, with the module it came from.
pub struct Discovered {
    pub module: String,
    pub kind: String,
    pub scraper: ScraperBox,
}

/// Maps manifest `kind`s to factories and turns a directory of manifests
/// into scrapers.
#[derive(Clone)]
pub struct ScraperRegistry {
    factories: HashMap<String, ScraperFactory>,
    context: ScraperContext,
}

impl ScraperRegistry {
    pub fn new(context: ScraperContext) -> Self {
        Self {
            factories: HashMap::new(),
            context,
        }
    }

    /// Registry with the `trhknih` and `css` kinds.
    pub fn with_builtin(context: ScraperContext) -> Self {
        let mut registry = Self::new(context);
        registry.register_factory("trhknih", TrhknihScraper::from_manifest);
        registry.register_factory("css", CssScraper::from_manifest);
        registry
    }

    /// Add or replace the factory for `kind`.
    pub fn register_factory<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&toml::Table, &ScraperContext) -> Result<ScraperBox> + Send + Sync + 'static,
    {
        let kind = kind.into();
        tracing::debug!("Registered scraper kind {}", kind);
        self.factories.insert(kind, Arc::new(factory));
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Instantiate every enabled scraper declared in `dir`, in manifest
    /// file-name order and declaration order within a file.
    pub fn discover(&self, dir: &Path) -> Result<Vec<ScraperBox>> {
        Ok(self
            .discover_detailed(dir)?
            .into_iter()
            .map(|found| found.scraper)
            .collect())
    }

    pub fn discover_detailed(&self, dir: &Path) -> Result<Vec<Discovered>> {
        let mut found = Vec::new();

        for path in manifest_paths(dir)? {
            let module = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            found.extend(self.load_module(&module, &path)?);
        }

        tracing::info!("Discovered {} scrapers in {}", found.len(), dir.display());
        Ok(found)
    }

    fn load_module(&self, module: &str, path: &Path) -> Result<Vec<Discovered>> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::plugin_load(module, e))?;
        let mut manifest: toml::Table = toml::from_str(&raw).map_err(|e| AppError::plugin_load(module, e))?;

        let tables = match manifest.remove("scraper") {
            None => {
                tracing::warn!("Module {} declares no [[scraper]] tables", module);
                return Ok(Vec::new());
            }
            Some(toml::Value::Array(items)) => items,
            Some(_) => return Err(AppError::plugin_load(module, "'scraper' must be an array of tables")),
        };

        let mut found = Vec::with_capacity(tables.len());
        for (index, value) in tables.into_iter().enumerate() {
            let toml::Value::Table(table) = value else {
                return Err(AppError::plugin_load(module, format!("scraper #{} is not a table", index)));
            };

            if !table.get("enabled").and_then(toml::Value::as_bool).unwrap_or(true) {
                tracing::debug!("Scraper #{} in {} is disabled", index, module);
                continue;
            }

            let kind = table
                .get("kind")
                .and_then(toml::Value::as_str)
                .ok_or_else(|| AppError::plugin_load(module, format!("scraper #{} has no kind", index)))?
                .to_string();

            let factory = self
                .factories
                .get(&kind)
                .ok_or_else(|| AppError::plugin_load(module, format!("unknown scraper kind '{}'", kind)))?;

            let scraper = factory(&table, &self.context).map_err(|e| match e {
                e @ AppError::PluginLoad { .. } => e,
                other => AppError::plugin_load(module, other),
            })?;

            tracing::debug!("Loaded {} scraper {} from {}", kind, scraper.base_identifier(), module);
            found.push(Discovered {
                module: module.to_string(),
                kind,
                scraper,
            });
        }

        Ok(found)
    }
}

fn manifest_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| AppError::plugin_load(dir.display().to_string(), e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_manifest = path.is_file()
            && path.extension().and_then(|ext| ext.to_str()) == Some(MANIFEST_EXTENSION);
        if is_manifest {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}
