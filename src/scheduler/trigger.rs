use chrono::{Datelike, Timelike, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::utils::error::{AppError, Result};

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[01][0-9]|2[0-3]):[0-5][0-9]$").expect("valid time regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Hourly,
    Daily,
    Weekly,
}

impl FromStr for Period {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(Period::Hourly),
            "daily" => Ok(Period::Daily),
            "weekly" => Ok(Period::Weekly),
            other => Err(AppError::InvalidConfig(format!(
                "period must be hourly, daily or weekly, got '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Period::Hourly => "hourly",
            Period::Daily => "daily",
            Period::Weekly => "weekly",
        };
        f.write_str(s)
    }
}

/// Parse `HH:MM` on a 24-hour clock.
pub fn parse_time(value: &str) -> Result<(u32, u32)> {
    let value = value.trim();
    if !TIME_RE.is_match(value) {
        return Err(AppError::InvalidConfig(format!(
            "time has to be in HH:MM format, got '{}'",
            value
        )));
    }
    let hour = value[..2].parse().map_err(|_| AppError::InvalidConfig(value.to_string()))?;
    let minute = value[3..].parse().map_err(|_| AppError::InvalidConfig(value.to_string()))?;
    Ok((hour, minute))
}

/// Parse a weekday given as `0..6` (0 = Monday) or an English day name.
pub fn parse_weekday(value: &str) -> Result<Weekday> {
    let value = value.trim();
    if let Ok(index) = value.parse::<u8>() {
        return Weekday::try_from(index).map_err(|_| {
            AppError::InvalidConfig(format!("weekday index must be 0..6, got {}", index))
        });
    }
    Weekday::from_str(value)
        .map_err(|_| AppError::InvalidConfig(format!("unknown weekday '{}'", value)))
}

/// When the scheduler fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub hour: u32,
    pub minute: u32,
    pub period: Period,
    pub weekday: Weekday,
}

impl Trigger {
    /// Build a trigger from the three stored settings. The weekday may be
    /// blank unless the period is weekly.
    pub fn parse(time: &str, period: &str, weekday: &str) -> Result<Self> {
        let (hour, minute) = parse_time(time)?;
        let period = Period::from_str(period)?;
        let weekday = if weekday.trim().is_empty() {
            if period == Period::Weekly {
                return Err(AppError::InvalidConfig("weekly period needs a weekday".into()));
            }
            Weekday::Mon
        } else {
            parse_weekday(weekday)?
        };

        Ok(Self {
            hour,
            minute,
            period,
            weekday,
        })
    }

    /// Whether `now` falls inside a minute this trigger fires in.
    pub fn matches<T: Datelike + Timelike>(&self, now: &T) -> bool {
        let minute_matches = now.minute() == self.minute;
        let time_matches = minute_matches && now.hour() == self.hour;

        match self.period {
            Period::Hourly => minute_matches,
            Period::Daily => time_matches,
            Period::Weekly => time_matches && now.weekday() == self.weekday,
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.period {
            Period::Hourly => write!(f, "hourly at minute {:02}", self.minute),
            Period::Daily => write!(f, "daily at {:02}:{:02}", self.hour, self.minute),
            Period::Weekly => write!(
                f,
                "weekly on {} at {:02}:{:02}",
                self.weekday, self.hour, self.minute
            ),
        }
    }
}
