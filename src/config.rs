use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::error::{AvailabilityError, Result};

/// How the candidate booking's own window is derived during conflict checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateWindow {
    /// The slot's own `[start, end)` interval
    Slot,
    /// As if booked at slot start, padded with the same buffers as existing commitments
    Buffered,
}

impl FromStr for CandidateWindow {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "slot" => Ok(CandidateWindow::Slot),
            "buffered" => Ok(CandidateWindow::Buffered),
            other => Err(format!("expected 'slot' or 'buffered', got '{}'", other)),
        }
    }
}

/// Global buffer/duration constants shared by every commitment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    pub before_minutes: u32,
    pub service_minutes: u32,
    pub after_minutes: u32,
    pub candidate_window: CandidateWindow,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            before_minutes: 60,
            service_minutes: 60,
            after_minutes: 60,
            candidate_window: CandidateWindow::Slot,
        }
    }
}

/// Business-hours window used to generate candidate slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHoursConfig {
    pub start_hour: u32,
    pub end_hour: u32,
    pub slot_duration_minutes: u32,
    pub timezone: Tz,
}

impl BusinessHoursConfig {
    pub fn validate(&self) -> Result<()> {
        if self.end_hour > 24 {
            return Err(AvailabilityError::validation("business_hours.end_hour", "must be at most 24"));
        }
        if self.start_hour >= self.end_hour {
            return Err(AvailabilityError::validation(
                "business_hours.start_hour",
                format!("must be before end hour {}", self.end_hour),
            ));
        }
        if self.slot_duration_minutes == 0 || self.slot_duration_minutes > 24 * 60 {
            return Err(AvailabilityError::validation(
                "business_hours.slot_duration_minutes",
                "must be between 1 and 1440",
            ));
        }
        Ok(())
    }
}

impl Default for BusinessHoursConfig {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 18,
            slot_duration_minutes: 60,
            timezone: chrono_tz::America::Los_Angeles,
        }
    }
}

/// Immutable engine configuration, built once and passed by value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub buffers: BufferConfig,
    pub business_hours: BusinessHoursConfig,
    pub cache_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffers: BufferConfig::default(),
            business_hours: BusinessHoursConfig::default(),
            cache_ttl: Duration::from_secs(300),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.business_hours.validate()?;
        if self.buffers.service_minutes == 0 {
            return Err(AvailabilityError::validation("buffers.service_minutes", "must be positive"));
        }
        if self.cache_ttl.is_zero() {
            return Err(AvailabilityError::validation("cache_ttl", "must be positive"));
        }
        Ok(())
    }

    /// Reads overrides from the environment, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();
        let config = EngineConfig {
            buffers: BufferConfig {
                before_minutes: parse_var(&lookup, "BUFFER_BEFORE_MINUTES", defaults.buffers.before_minutes)?,
                service_minutes: parse_var(&lookup, "SERVICE_DURATION_MINUTES", defaults.buffers.service_minutes)?,
                after_minutes: parse_var(&lookup, "BUFFER_AFTER_MINUTES", defaults.buffers.after_minutes)?,
                candidate_window: parse_var(&lookup, "CANDIDATE_WINDOW", defaults.buffers.candidate_window)?,
            },
            business_hours: BusinessHoursConfig {
                start_hour: parse_var(&lookup, "BUSINESS_START_HOUR", defaults.business_hours.start_hour)?,
                end_hour: parse_var(&lookup, "BUSINESS_END_HOUR", defaults.business_hours.end_hour)?,
                slot_duration_minutes: parse_var(
                    &lookup,
                    "SLOT_DURATION_MINUTES",
                    defaults.business_hours.slot_duration_minutes,
                )?,
                timezone: parse_var(&lookup, "BUSINESS_TIMEZONE", defaults.business_hours.timezone)?,
            },
            cache_ttl: Duration::from_secs(parse_var(&lookup, "CACHE_TTL_SECS", defaults.cache_ttl.as_secs())?),
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AvailabilityError::validation(name, format!("cannot parse '{}': {}", raw, e))),
        None => Ok(default),
    }
}

/// Settings for the HTTP / CLI front end
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub admin_password: String,
    pub data_dir: PathBuf,
}

impl ServerConfig {
    pub const DEFAULT_PORT: u16 = 8080;
    const DEFAULT_PASSWORD: &'static str = "admin123";

    pub fn from_env(port_arg: Option<&str>) -> Result<Self> {
        let port = match port_arg {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| AvailabilityError::validation("port", e.to_string()))?,
            None => Self::DEFAULT_PORT,
        };
        let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| {
            tracing::warn!("ADMIN_PASSWORD not set, using the built-in default");
            Self::DEFAULT_PASSWORD.to_string()
        });
        Ok(Self {
            port,
            admin_password,
            data_dir: Self::data_dir_from_env(),
        })
    }

    /// `AVAILABILITY_DATA_DIR`, default `data`
    pub fn data_dir_from_env() -> PathBuf {
        env::var("AVAILABILITY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"))
    }
}
