use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;
use crate::matcher::DEFAULT_MATCH_THRESHOLD;
use crate::rank::{GroupPolicy, LOTTERY_SIZE, PLAYOFF_SIZE};

pub const CONFIG_FILE: &str = "prospect-rc.json";
pub const SOURCE_URL_ENV: &str = "NBA_STANDINGS_SOURCE_URL";

pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_HTML_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_POLITE_DELAY_MS: u64 = 2_000;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3_600;
pub const DEFAULT_CACHE_ENTRIES: usize = 256;
pub const DEFAULT_OUTPUT: &str = "public/data/nba_standings.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub match_threshold: Option<f64>,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub standings: StandingsSection,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    #[serde(default)]
    pub max_entries: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SearchSection {
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub polite_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StandingsSection {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub min_rows: Option<usize>,
    #[serde(default)]
    pub split_index: Option<usize>,
    #[serde(default)]
    pub expected_lottery: Option<usize>,
    #[serde(default)]
    pub expected_playoff: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SourceEntry {
    pub name: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub reliability: Option<f64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Per-source settings that replace the built-in ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceOverride {
    pub enabled: bool,
    pub reliability: Option<f64>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub match_threshold: f64,
    pub cache_ttl: Duration,
    pub cache_entries: usize,
    pub search_deadline: Option<Duration>,
    pub polite_delay: Duration,
    pub output: Utf8PathBuf,
    pub min_rows: usize,
    pub groups: GroupPolicy,
    pub sources: BTreeMap<String, SourceOverride>,
}

impl ResolvedConfig {
    pub fn source_override(&self, name: &str) -> Option<&SourceOverride> {
        self.sources.get(name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.source_override(name).is_none_or(|entry| entry.enabled)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the given file, else `prospect-rc.json` in the working directory,
    /// else the per-user one. With none of them, built-in defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ReconcileError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => match Self::discover() {
                Some(found) => found,
                None => return Self::resolve_config(Config::default()),
            },
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ReconcileError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ReconcileError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("prospect-rc").join("config.json"))
            .filter(|path| path.exists())
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ReconcileError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(ReconcileError::ConfigInvalid(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let match_threshold = config.match_threshold.unwrap_or(DEFAULT_MATCH_THRESHOLD);
        if !(0.0..=1.0).contains(&match_threshold) {
            return Err(ReconcileError::ConfigInvalid(format!(
                "match_threshold must be in [0, 1], got {match_threshold}"
            )));
        }

        let cache_entries = config.cache.max_entries.unwrap_or(DEFAULT_CACHE_ENTRIES);
        if cache_entries == 0 {
            return Err(ReconcileError::ConfigInvalid(
                "cache.max_entries must be positive".to_string(),
            ));
        }

        let standings = config.standings;
        let min_rows = standings.min_rows.unwrap_or(crate::fallback::DEFAULT_MIN_ROWS);
        if min_rows == 0 {
            return Err(ReconcileError::ConfigInvalid(
                "standings.min_rows must be positive".to_string(),
            ));
        }

        let mut sources = BTreeMap::new();
        for entry in config.sources {
            if let Some(reliability) = entry.reliability {
                if !(reliability > 0.0 && reliability <= 1.0) {
                    return Err(ReconcileError::ConfigInvalid(format!(
                        "reliability for {} must be in (0, 1], got {reliability}",
                        entry.name
                    )));
                }
            }
            if entry.timeout_ms == Some(0) {
                return Err(ReconcileError::ConfigInvalid(format!(
                    "timeout_ms for {} must be positive",
                    entry.name
                )));
            }
            let previous = sources.insert(
                entry.name.clone(),
                SourceOverride {
                    enabled: entry.enabled.unwrap_or(true),
                    reliability: entry.reliability,
                    timeout: entry.timeout_ms.map(Duration::from_millis),
                },
            );
            if previous.is_some() {
                return Err(ReconcileError::ConfigInvalid(format!(
                    "source {} listed more than once",
                    entry.name
                )));
            }
        }

        Ok(ResolvedConfig {
            schema_version,
            match_threshold,
            cache_ttl: Duration::from_secs(config.cache.ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS)),
            cache_entries,
            search_deadline: config.search.deadline_ms.map(Duration::from_millis),
            polite_delay: Duration::from_millis(
                config.search.polite_delay_ms.unwrap_or(DEFAULT_POLITE_DELAY_MS),
            ),
            output: Utf8PathBuf::from(
                standings
                    .output
                    .unwrap_or_else(|| DEFAULT_OUTPUT.to_string()),
            ),
            min_rows,
            groups: GroupPolicy {
                split_index: standings.split_index.unwrap_or(LOTTERY_SIZE),
                expected_a: Some(standings.expected_lottery.unwrap_or(LOTTERY_SIZE)),
                expected_b: Some(standings.expected_playoff.unwrap_or(PLAYOFF_SIZE)),
            },
            sources,
        })
    }
}

/// The custom standings URL: the `--source` flag when given, else the
/// environment variable. Blank values count as absent.
pub fn custom_source_url(flag: Option<&str>) -> Option<String> {
    let env = std::env::var(SOURCE_URL_ENV).ok();
    pick_source_url(flag, env.as_deref())
}

pub fn pick_source_url(flag: Option<&str>, env: Option<&str>) -> Option<String> {
    [flag, env]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .map(str::to_string)
}
