//! Runtime settings store: mail credentials and the scheduler trigger.
//!
//! All reads and writes go through one mutex. Every write to a trigger field
//! bumps a schedule version so the scheduler can tell its copy is stale and
//! re-read all trigger fields in one locked snapshot.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};
use validator::{Validate, ValidationError};

use crate::scheduler::trigger::{parse_time, parse_weekday, Period, Trigger};
use crate::utils::error::{AppError, Result};

pub const LOGIN: &str = "login";
pub const PASSWORD: &str = "password";
pub const RECIPIENT: &str = "recipient";
pub const SERVER: &str = "server";
pub const PORT: &str = "port";
pub const TIME: &str = "time";
pub const PERIOD: &str = "period";
pub const WEEKDAY: &str = "weekday";

pub const KEYS: [&str; 8] = [LOGIN, PASSWORD, RECIPIENT, SERVER, PORT, TIME, PERIOD, WEEKDAY];
const SCHEDULE_KEYS: [&str; 3] = [TIME, PERIOD, WEEKDAY];

static SERVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid server regex"));

fn validate_server(value: &str) -> std::result::Result<(), ValidationError> {
    if SERVER_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("server"))
    }
}

fn validate_port(value: &str) -> std::result::Result<(), ValidationError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(()),
        _ => Err(ValidationError::new("port")),
    }
}

fn validate_time(value: &str) -> std::result::Result<(), ValidationError> {
    parse_time(value).map(|_| ()).map_err(|_| ValidationError::new("time"))
}

fn validate_period(value: &str) -> std::result::Result<(), ValidationError> {
    value
        .parse::<Period>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("period"))
}

fn validate_weekday(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    parse_weekday(value).map(|_| ()).map_err(|_| ValidationError::new("weekday"))
}

/// The user-editable settings, stored as text exactly as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    #[validate(email(message = "Login is invalid"))]
    pub login: String,
    #[validate(length(min = 1, message = "Password is missing"))]
    pub password: String,
    #[validate(email(message = "Recipient is invalid"))]
    pub recipient: String,
    #[validate(custom(function = "validate_server", message = "Server is invalid"))]
    pub server: String,
    #[validate(custom(function = "validate_port", message = "Port has to be a number"))]
    pub port: String,
    #[validate(custom(function = "validate_time", message = "Time has to be in HH:MM format"))]
    pub time: String,
    #[validate(custom(function = "validate_period", message = "Period has to be hourly, daily or weekly"))]
    pub period: String,
    #[validate(custom(function = "validate_weekday", message = "Weekday is invalid"))]
    pub weekday: String,
}

impl Settings {
    fn get(&self, key: &str) -> Option<&str> {
        match key {
            LOGIN => Some(&self.login),
            PASSWORD => Some(&self.password),
            RECIPIENT => Some(&self.recipient),
            SERVER => Some(&self.server),
            PORT => Some(&self.port),
            TIME => Some(&self.time),
            PERIOD => Some(&self.period),
            WEEKDAY => Some(&self.weekday),
            _ => None,
        }
    }

    fn slot(&mut self, key: &str) -> Option<&mut String> {
        match key {
            LOGIN => Some(&mut self.login),
            PASSWORD => Some(&mut self.password),
            RECIPIENT => Some(&mut self.recipient),
            SERVER => Some(&mut self.server),
            PORT => Some(&mut self.port),
            TIME => Some(&mut self.time),
            PERIOD => Some(&mut self.period),
            WEEKDAY => Some(&mut self.weekday),
            _ => None,
        }
    }

    /// Field checks plus the cross-field trigger check.
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        Trigger::parse(&self.time, &self.period, &self.weekday)?;
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    settings: Settings,
}

/// Everything the mailer needs to log in and deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailerKeys {
    pub login: String,
    pub password: String,
    pub recipient: String,
    pub server: String,
    pub port: u16,
}

/// The three trigger fields, read together, tagged with the schedule version
/// they were read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub time: String,
    pub period: String,
    pub weekday: String,
    pub version: u64,
}

struct Inner {
    settings: Settings,
    scheduler_version: u64,
}

pub struct ConfigStore {
    path: Option<PathBuf>,
    inner: Mutex<Inner>,
}

impl ConfigStore {
    /// Open the settings file, creating an empty one if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let settings = if path.exists() {
            load(&path)?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, "[settings]\n")?;
            tracing::info!("Created new settings file at {}", path.display());
            Settings::default()
        };

        Ok(Self::build(Some(path), settings))
    }

    /// A store that never touches the disk.
    pub fn in_memory(settings: Settings) -> Self {
        Self::build(None, settings)
    }

    fn build(path: Option<PathBuf>, settings: Settings) -> Self {
        Self {
            path,
            inner: Mutex::new(Inner {
                settings,
                scheduler_version: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn settings(&self) -> Settings {
        self.lock().settings.clone()
    }

    pub fn get_key(&self, key: &str) -> Result<String> {
        self.lock()
            .settings
            .get(key)
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidConfig(format!("unknown settings key '{}'", key)))
    }

    pub fn get_mailer_keys(&self) -> Result<MailerKeys> {
        let inner = self.lock();
        let s = &inner.settings;
        let port = s
            .port
            .trim()
            .parse::<u16>()
            .map_err(|_| AppError::InvalidConfig(format!("port '{}' is not a number", s.port)))?;

        Ok(MailerKeys {
            login: s.login.clone(),
            password: s.password.clone(),
            recipient: s.recipient.clone(),
            server: s.server.clone(),
            port,
        })
    }

    pub fn get_scheduler_keys(&self) -> SchedulerSnapshot {
        let inner = self.lock();
        SchedulerSnapshot {
            time: inner.settings.time.clone(),
            period: inner.settings.period.clone(),
            weekday: inner.settings.weekday.clone(),
            version: inner.scheduler_version,
        }
    }

    /// Trigger snapshot and full validation under the same lock, so the
    /// fields checked are exactly the fields returned.
    pub fn validated_scheduler_keys(&self) -> Result<SchedulerSnapshot> {
        let inner = self.lock();
        inner.settings.check()?;
        Ok(SchedulerSnapshot {
            time: inner.settings.time.clone(),
            period: inner.settings.period.clone(),
            weekday: inner.settings.weekday.clone(),
            version: inner.scheduler_version,
        })
    }

    /// Pick up edits made to the settings file by another process.
    ///
    /// Returns whether anything changed. The schedule version moves only when
    /// a trigger field differs. A file that no longer parses leaves the
    /// current settings in place.
    pub fn reload_if_changed(&self) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };

        let mut inner = self.lock();
        let on_disk = load(path)?;
        if on_disk == inner.settings {
            return Ok(false);
        }

        let schedule_changed = SCHEDULE_KEYS
            .iter()
            .any(|key| on_disk.get(key) != inner.settings.get(key));
        inner.settings = on_disk;
        if schedule_changed {
            inner.scheduler_version += 1;
        }
        tracing::info!(
            version = inner.scheduler_version,
            "Reloaded settings from {}",
            path.display()
        );
        Ok(true)
    }

    pub fn scheduler_version(&self) -> u64 {
        self.lock().scheduler_version
    }

    /// True when the trigger fields changed after the scheduler read
    /// version `seen`.
    pub fn is_stale_for_scheduler(&self, seen: u64) -> bool {
        self.scheduler_version() != seen
    }

    pub fn validate(&self) -> Result<()> {
        self.lock().settings.check()
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn set_key(&self, key: &str, value: &str) -> Result<()> {
        self.set_keys(&[(key, value)])
    }

    /// Apply several writes under one lock and persist them together.
    pub fn set_keys(&self, pairs: &[(&str, &str)]) -> Result<()> {
        if let Some((key, _)) = pairs.iter().find(|(key, _)| !KEYS.contains(key)) {
            return Err(AppError::InvalidConfig(format!("unknown settings key '{}'", key)));
        }

        let mut inner = self.lock();
        let mut updated = inner.settings.clone();
        let mut schedule_touched = false;

        for (key, value) in pairs {
            if let Some(slot) = updated.slot(key) {
                *slot = value.to_string();
            }
            schedule_touched |= SCHEDULE_KEYS.contains(key);
        }

        if let Some(path) = &self.path {
            save(path, &updated)?;
        }

        inner.settings = updated;
        if schedule_touched {
            inner.scheduler_version += 1;
            tracing::debug!(version = inner.scheduler_version, "Schedule settings changed");
        }
        Ok(())
    }
}

fn load(path: &Path) -> Result<Settings> {
    let raw = std::fs::read_to_string(path)?;
    let file: SettingsFile = toml::from_str(&raw)
        .map_err(|e| AppError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
    Ok(file.settings)
}

fn save(path: &Path, settings: &Settings) -> Result<()> {
    let body = toml::to_string(&SettingsFile {
        settings: settings.clone(),
    })
    .map_err(|e| AppError::InvalidConfig(format!("cannot serialize settings: {}", e)))?;

    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
