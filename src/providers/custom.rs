use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::domain::RawRecord;
use crate::error::ReconcileError;
use crate::http::{HttpClient, HttpRequest};
use crate::source::Source;

pub const NAME: &str = "custom-source";

/// A user-supplied URL serving either `[{team, wins, losses}, ...]` or
/// `{"teams": [...]}`.
pub struct CustomJsonSource {
    url: String,
    http: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl CustomJsonSource {
    pub fn new(url: impl Into<String>, http: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            http,
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Source for CustomJsonSource {
    fn fetch(&self, _season: &str) -> Result<Option<Vec<RawRecord>>, ReconcileError> {
        let payload = self.http.get_json(&HttpRequest::get(&self.url, self.timeout))?;
        let rows = parse_custom(&payload).ok_or_else(|| {
            ReconcileError::malformed(NAME, "expected an array or an object with `teams`")
        })?;
        Ok((!rows.is_empty()).then_some(rows))
    }
}

pub fn parse_custom(payload: &Value) -> Option<Vec<RawRecord>> {
    let teams = match payload {
        Value::Array(items) => items,
        Value::Object(object) => object.get("teams")?.as_array()?,
        _ => return None,
    };
    Some(teams.iter().filter_map(Value::as_object).map(team_record).collect())
}

fn team_record(team: &Map<String, Value>) -> RawRecord {
    let mut record = team.clone();
    if !record.contains_key("winPct") {
        let explicit = team.get("win_percentage").cloned();
        let wins = team.get("W").and_then(Value::as_f64);
        let losses = team.get("L").and_then(Value::as_f64);
        let computed = match (wins, losses) {
            (Some(wins), Some(losses)) if wins + losses > 0.0 => {
                Some(Value::from(wins / (wins + losses)))
            }
            _ => None,
        };
        if let Some(pct) = explicit.or(computed) {
            record.insert("winPct".to_string(), pct);
        }
    }
    if !record.contains_key("conf") {
        if let Some(conference) = team.get("conference").cloned() {
            record.insert("conf".to_string(), conference);
        }
    }
    if !record.contains_key("confRank") {
        if let Some(rank) = ["conference_rank", "rank"].iter().find_map(|key| team.get(*key)) {
            record.insert("confRank".to_string(), rank.clone());
        }
    }
    record
}
