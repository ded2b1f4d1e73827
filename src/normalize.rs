use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::domain::{FieldValue, RawRecord, TeamCode};
use crate::matcher::{fold_name, name_similarity};
use crate::source::SourceDescriptor;

/// Fixed aliases between provider team codes and the canonical ones.
pub const TEAM_CODE_ALIASES: &[(&str, &str)] =
    &[("BRK", "BKN"), ("CHO", "CHA"), ("PHO", "PHX")];

const NAME_FIELDS: &[&str] = &[
    "name",
    "fullName",
    "full_name",
    "playerName",
    "player_name",
    "nome",
];
const TEAM_CODE_FIELDS: &[&str] = &[
    "team",
    "tricode",
    "teamTricode",
    "teamTriCode",
    "TeamTriCode",
    "teamCode",
    "code",
];
const WINS_FIELDS: &[&str] = &["wins", "win", "W"];
const LOSSES_FIELDS: &[&str] = &["losses", "loss", "L"];
const WIN_PCT_FIELDS: &[&str] = &["winPct", "win_pct", "W_PCT", "win_percentage"];
const CONFIDENCE_FIELDS: &[&str] = &["confidence", "matchConfidence"];

/// Counting stats an athlete record always carries; absent ones default to 0.
pub const ATHLETE_COUNTING_FIELDS: &[&str] = &["games_played", "points", "rebounds", "assists"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaHint {
    Athlete,
    Standings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub identity_key: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub source_name: String,
    pub reliability: f64,
    pub match_confidence: f64,
}

impl CanonicalRecord {
    /// The name used for matching: the athlete name or the team code.
    pub fn display_name(&self) -> &str {
        let key = if self.fields.contains_key("name") {
            "name"
        } else {
            "team"
        };
        self.fields
            .get(key)
            .and_then(|field| field.value.as_str())
            .unwrap_or("")
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).map(|field| &field.value)
    }
}

/// Deterministic key: case-folded, diacritics stripped, whitespace collapsed to `_`.
pub fn identity_key(display_name: &str) -> String {
    fold_name(display_name).replace(' ', "_")
}

pub fn canonical_team_code(code: &str) -> Option<TeamCode> {
    let upper = code.trim().to_uppercase();
    let aliased = TEAM_CODE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == upper)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(upper.as_str());
    aliased.parse().ok()
}

/// Maps one raw record into the canonical shape, or `None` when it has no
/// identity field. With a query, match confidence is the name similarity to it;
/// otherwise a source-provided confidence is used, defaulting to 1.
pub fn normalize(
    raw: &RawRecord,
    source: &SourceDescriptor,
    query: Option<&str>,
) -> Option<CanonicalRecord> {
    let mut record = match source.schema() {
        SchemaHint::Athlete => normalize_athlete(raw)?,
        SchemaHint::Standings => normalize_standing_fields(raw)?,
    };

    let display_name = match source.schema() {
        SchemaHint::Athlete => first_text(raw, NAME_FIELDS)?,
        SchemaHint::Standings => record
            .get("team")
            .and_then(|field| field.value.as_str())
            .map(str::to_string)?,
    };
    let identity_key = identity_key(&display_name);
    if identity_key.is_empty() {
        debug!(
            source = source.name(),
            name = display_name.as_str(),
            "record dropped, name folds to nothing"
        );
        return None;
    }

    let match_confidence = match query {
        Some(query) => name_similarity(&display_name, query),
        None => first_value(raw, CONFIDENCE_FIELDS)
            .and_then(as_float)
            .unwrap_or(1.0),
    }
    .clamp(0.0, 1.0);

    record.retain(|_, field| !field.is_empty() || !field.is_verified());

    Some(CanonicalRecord {
        identity_key,
        fields: record,
        source_name: source.name().to_string(),
        reliability: source.reliability(),
        match_confidence,
    })
}

fn normalize_athlete(raw: &RawRecord) -> Option<BTreeMap<String, FieldValue>> {
    let name = first_text(raw, NAME_FIELDS)?;
    let mut fields = BTreeMap::new();

    for (key, value) in raw {
        if NAME_FIELDS.contains(&key.as_str()) || CONFIDENCE_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let value = match value {
            Value::String(text) => Value::String(text.trim().to_string()),
            other => other.clone(),
        };
        fields.insert(key.clone(), FieldValue::source(value));
    }
    fields.insert("name".to_string(), FieldValue::source(Value::String(name)));

    if let Some(age) = fields.get("age").and_then(|field| parse_age(&field.value)) {
        fields.insert("age".to_string(), FieldValue::source(Value::from(age)));
    }

    for stat in ATHLETE_COUNTING_FIELDS {
        let parsed = fields.get(*stat).and_then(|field| as_float(&field.value));
        let field = match parsed {
            Some(number) => FieldValue::source(number_value(number)),
            None => FieldValue::defaulted(Value::from(0)),
        };
        fields.insert(stat.to_string(), field);
    }

    Some(fields)
}

fn normalize_standing_fields(raw: &RawRecord) -> Option<BTreeMap<String, FieldValue>> {
    let code = first_text(raw, TEAM_CODE_FIELDS)?;
    let team = canonical_team_code(&code)?;
    let mut fields = BTreeMap::new();
    fields.insert(
        "team".to_string(),
        FieldValue::source(Value::String(team.to_string())),
    );

    for (key, aliases) in [("wins", WINS_FIELDS), ("losses", LOSSES_FIELDS)] {
        let field = match first_value(raw, aliases).and_then(as_count) {
            Some(count) => FieldValue::source(Value::from(count)),
            None => FieldValue::defaulted(Value::from(0)),
        };
        fields.insert(key.to_string(), field);
    }

    if let Some(pct) = first_value(raw, WIN_PCT_FIELDS).and_then(as_float) {
        if (0.0..=1.0).contains(&pct) {
            fields.insert("winPct".to_string(), FieldValue::source(Value::from(pct)));
        }
    }
    for (key, value) in raw {
        if matches!(key.as_str(), "conf" | "conference" | "confRank") {
            fields.insert(key.clone(), FieldValue::source(value.clone()));
        }
    }

    Some(fields)
}

fn first_value<'a>(raw: &'a RawRecord, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find(|value| !value.is_null())
}

fn first_text(raw: &RawRecord, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

pub fn as_float(value: &Value) -> Option<f64> {
    let number: Option<f64> = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    };
    number.filter(|number| number.is_finite())
}

pub fn as_count(value: &Value) -> Option<u32> {
    let number = as_float(value)?;
    if number < 0.0 || number > u32::MAX as f64 {
        return None;
    }
    Some(number.round() as u32)
}

fn parse_age(value: &Value) -> Option<u32> {
    match value {
        Value::String(text) => {
            let digits = text
                .chars()
                .skip_while(|ch| !ch.is_ascii_digit())
                .take_while(|ch| ch.is_ascii_digit())
                .collect::<String>();
            digits.parse().ok()
        }
        other => as_count(other),
    }
}

fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number >= 0.0 && number <= u32::MAX as f64 {
        Value::from(number as u32)
    } else {
        Value::from(number)
    }
}
