use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub scheduler: SchedulerConfig,
    pub scraper: ScraperConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub settings_file: PathBuf,
    pub queries_file: PathBuf,
    pub scrapers_dir: PathBuf,
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub cycle_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub subject: String,
    pub from_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                settings_file: PathBuf::from("settings.toml"),
                queries_file: PathBuf::from("queries.yaml"),
                scrapers_dir: PathBuf::from("scrapers"),
                log_dir: PathBuf::from("logs"),
            },
            scheduler: SchedulerConfig { cycle_seconds: 60 },
            scraper: ScraperConfig {
                request_timeout_secs: 10,
                user_agent: concat!("AntiqueWatchdog/", env!("CARGO_PKG_VERSION")).to_string(),
            },
            mail: MailConfig {
                subject: "Report:".to_string(),
                from_name: "Antique Watchdog".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Layer `<dir>/default`, `<dir>/local` and `AW__*` environment variables
    /// over the built-in defaults.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let defaults = Config::try_from(&AppConfig::default())?;

        let s = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(&config_dir.join("default").to_string_lossy()).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name(&config_dir.join("local").to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("AW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.cycle_seconds == 0 {
            return Err(ConfigError::Message("Scheduler cycle_seconds must be greater than 0".into()));
        }

        if self.scraper.request_timeout_secs == 0 {
            return Err(ConfigError::Message("Scraper request_timeout_secs must be greater than 0".into()));
        }

        if self.scraper.user_agent.trim().is_empty() {
            return Err(ConfigError::Message("Scraper user_agent must not be empty".into()));
        }

        let paths = [
            ("settings_file", &self.paths.settings_file),
            ("queries_file", &self.paths.queries_file),
            ("scrapers_dir", &self.paths.scrapers_dir),
            ("log_dir", &self.paths.log_dir),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Message(format!("Path {} must not be empty", name)));
            }
        }

        Ok(())
    }
}
