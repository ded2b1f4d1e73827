use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ReconcileError;

/// A record exactly as one source produced it.
pub type RawRecord = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Federation,
    Specialized,
    Social,
    OfficialApi,
    HtmlScrape,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Federation => write!(f, "federation"),
            SourceKind::Specialized => write!(f, "specialized"),
            SourceKind::Social => write!(f, "social"),
            SourceKind::OfficialApi => write!(f, "official-api"),
            SourceKind::HtmlScrape => write!(f, "html-scrape"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldOrigin {
    /// Reported by the source itself.
    Source,
    /// Missing at the source and filled with the declared default.
    Defaulted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: Value,
    pub origin: FieldOrigin,
}

impl FieldValue {
    pub fn source(value: Value) -> Self {
        Self {
            value,
            origin: FieldOrigin::Source,
        }
    }

    pub fn defaulted(value: Value) -> Self {
        Self {
            value,
            origin: FieldOrigin::Defaulted,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::String(text) => text.trim().is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.origin == FieldOrigin::Source
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamCode(String);

impl TeamCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TeamCode {
    type Err = ReconcileError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let is_valid = (2..=4).contains(&normalized.len())
            && normalized.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(ReconcileError::InvalidTeamCode(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Season(String);

impl Season {
    pub fn from_start_year(start: i32) -> Self {
        let suffix = (start.rem_euclid(100) + 1) % 100;
        Self(format!("{start}-{suffix:02}"))
    }

    /// Accepts `YYYY-YY`, rebuilding from `start_year` when the text is not in
    /// that form and fixing an inconsistent two-digit suffix.
    pub fn normalize(input: Option<&str>, start_year: i32) -> Self {
        let Some(text) = input else {
            return Self::from_start_year(start_year);
        };
        match split_season(text) {
            Some((start, suffix)) => {
                let expected = Self::from_start_year(start);
                if expected.suffix() != suffix {
                    warn!(
                        season = text,
                        expected = expected.as_str(),
                        "season suffix inconsistent, correcting"
                    );
                }
                expected
            }
            None => {
                let rebuilt = Self::from_start_year(start_year);
                warn!(
                    season = text,
                    rebuilt = rebuilt.as_str(),
                    "season has invalid format, rebuilding from start year"
                );
                rebuilt
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn start_year(&self) -> i32 {
        split_season(&self.0).map(|(start, _)| start).unwrap_or(0)
    }

    pub fn end_year(&self) -> i32 {
        self.start_year() + 1
    }

    fn suffix(&self) -> &str {
        self.0.split_once('-').map(|(_, rest)| rest).unwrap_or("")
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Season {
    type Err = ReconcileError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (start, suffix) = split_season(value.trim())
            .ok_or_else(|| ReconcileError::InvalidSeason(value.to_string()))?;
        let season = Self::from_start_year(start);
        if season.suffix() != suffix {
            return Err(ReconcileError::InvalidSeason(value.to_string()));
        }
        Ok(season)
    }
}

fn split_season(text: &str) -> Option<(i32, &str)> {
    let (start, suffix) = text.split_once('-')?;
    let valid = start.len() == 4
        && suffix.len() == 2
        && start.chars().all(|ch| ch.is_ascii_digit())
        && suffix.chars().all(|ch| ch.is_ascii_digit());
    if !valid {
        return None;
    }
    Some((start.parse().ok()?, suffix))
}
