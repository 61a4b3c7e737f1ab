//! Collector and scheduler configuration.
//!
//! Everything here is decided once at startup and passed down explicitly;
//! nothing reads global state during a scrape.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::collector::catalog::Component;
use crate::collector::cache::DEFAULT_READER_THREADS;

/// How much of a component's catalog is collected.
///
/// Ordered so that a definition is collected when its own level is less than
/// or equal to the configured one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Disabled,
    Core,
    Extended,
}

impl DetailLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            DetailLevel::Disabled => "disabled",
            DetailLevel::Core => "core",
            DetailLevel::Extended => "extended",
        }
    }
}

impl std::fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetailLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" => Ok(DetailLevel::Disabled),
            "core" => Ok(DetailLevel::Core),
            "extended" => Ok(DetailLevel::Extended),
            _ => Err(ConfigError::InvalidLevel(s.to_string())),
        }
    }
}

/// Configuration error. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownComponent(String),
    InvalidLevel(String),
    /// Override not of the form `name=level`.
    InvalidOverride(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnknownComponent(name) => write!(
                f,
                "unknown collector '{}' (expected one of: {})",
                name,
                Component::ALL.map(Component::as_str).join(", ")
            ),
            ConfigError::InvalidLevel(level) => write!(
                f,
                "invalid level '{}' (expected disabled, core or extended)",
                level
            ),
            ConfigError::InvalidOverride(raw) => {
                write!(f, "invalid collector override '{}' (expected name=level)", raw)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Which parts of the catalog are collected and where the trees live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectorConfig {
    pub proc_path: PathBuf,
    pub sys_path: PathBuf,
    levels: BTreeMap<Component, DetailLevel>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            proc_path: PathBuf::from("/proc"),
            sys_path: PathBuf::from("/sys"),
            levels: Component::ALL
                .into_iter()
                .map(|c| (c, DetailLevel::Extended))
                .collect(),
        }
    }
}

impl CollectorConfig {
    /// Default levels with the given tree roots.
    pub fn new(proc_path: impl Into<PathBuf>, sys_path: impl Into<PathBuf>) -> Self {
        Self {
            proc_path: proc_path.into(),
            sys_path: sys_path.into(),
            ..Self::default()
        }
    }

    /// Configured level of `component`.
    pub fn level(&self, component: Component) -> DetailLevel {
        self.levels
            .get(&component)
            .copied()
            .unwrap_or(DetailLevel::Disabled)
    }

    pub fn set_level(&mut self, component: Component, level: DetailLevel) {
        self.levels.insert(component, level);
    }

    /// Applies one `name=level` override, e.g. `lnet=core`.
    pub fn apply_override(&mut self, raw: &str) -> Result<(), ConfigError> {
        let (name, level) = raw
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidOverride(raw.to_string()))?;
        let component: Component = name.parse()?;
        let level: DetailLevel = level.parse()?;
        self.set_level(component, level);
        Ok(())
    }

    /// Per-component levels, in catalog order.
    pub fn levels(&self) -> impl Iterator<Item = (Component, DetailLevel)> + '_ {
        self.levels.iter().map(|(c, l)| (*c, *l))
    }
}

/// Scrape coordinator tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of rounds running at once.
    pub max_rounds: usize,
    /// A completed round younger than this is served as-is.
    pub freshness: Duration,
    /// A source still running after this long is reported as failed.
    pub source_timeout: Option<Duration>,
    /// Background reader threads per path cache.
    pub reader_threads: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_rounds: 4,
            freshness: Duration::from_secs(1),
            source_timeout: None,
            reader_threads: DEFAULT_READER_THREADS,
        }
    }
}
