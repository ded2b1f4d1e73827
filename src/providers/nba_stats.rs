use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::domain::RawRecord;
use crate::error::ReconcileError;
use crate::http::{HttpClient, HttpRequest};
use crate::source::Source;

pub const NAME: &str = "nba-stats";

const STATS_BASE: &str = "https://stats.nba.com/stats/leagueStandings";

/// stats.nba.com league standings. The query is the season (`2025-26`).
pub struct NbaStatsSource {
    http: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl NbaStatsSource {
    pub fn new(http: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    fn request(&self, season: &str) -> HttpRequest {
        let url = format!(
            "{STATS_BASE}?LeagueID=00&Season={}&SeasonType=Regular%20Season",
            season.trim()
        );
        HttpRequest::get(url, self.timeout)
            .header("Referer", "https://www.nba.com/")
            .header("Origin", "https://www.nba.com")
    }
}

impl Source for NbaStatsSource {
    fn fetch(&self, season: &str) -> Result<Option<Vec<RawRecord>>, ReconcileError> {
        let payload = self.http.get_json(&self.request(season))?;
        let rows = parse_league_standings(&payload)
            .ok_or_else(|| ReconcileError::malformed(NAME, "missing resultSets headers/rowSet"))?;
        Ok((!rows.is_empty()).then_some(rows))
    }
}

/// Reads the first result set, found either at the top level or under
/// `leagueStandings`. Columns are located by header name.
pub fn parse_league_standings(payload: &Value) -> Option<Vec<RawRecord>> {
    let result_set = payload
        .pointer("/resultSets/0")
        .or_else(|| payload.pointer("/leagueStandings/resultSets/0"))?;
    let headers = result_set.get("headers")?.as_array()?;
    let rows = result_set.get("rowSet")?.as_array()?;

    let column = |name: &str| headers.iter().position(|header| header.as_str() == Some(name));
    let columns = [
        ("team", column("TeamTriCode")),
        ("wins", column("W")),
        ("losses", column("L")),
        ("winPct", column("W_PCT")),
        ("conf", column("Conference")),
        ("confRank", column("ConfRank")),
    ];
    column("TeamTriCode")?;

    let records = rows
        .iter()
        .filter_map(Value::as_array)
        .filter_map(|row| {
            let mut record = Map::new();
            for (key, index) in columns {
                if let Some(value) = index.and_then(|index| row.get(index)) {
                    if !value.is_null() {
                        record.insert(key.to_string(), value.clone());
                    }
                }
            }
            record
                .get("team")
                .and_then(Value::as_str)
                .is_some_and(|team| !team.trim().is_empty())
                .then_some(record)
        })
        .collect();
    Some(records)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_row_set_by_header() {
        let payload = json!({
            "resultSets": [{
                "headers": ["TeamID", "TeamTriCode", "Conference", "ConfRank", "W", "L", "W_PCT"],
                "rowSet": [
                    [1610612738, "BOS", "East", 1, 50, 10, 0.833],
                    [1610612765, "DET", "East", 15, 10, 50, 0.167],
                    [0, null, "East", 0, 0, 0, 0.0]
                ]
            }]
        });
        let rows = parse_league_standings(&payload).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["team"], json!("BOS"));
        assert_eq!(rows[0]["wins"], json!(50));
        assert_eq!(rows[1]["winPct"], json!(0.167));
        assert_eq!(rows[1]["conf"], json!("East"));
    }

    #[test]
    fn accepts_nested_league_standings() {
        let payload = json!({
            "leagueStandings": {
                "resultSets": [{"headers": ["TeamTriCode", "W", "L"], "rowSet": [["MIA", 30, 30]]}]
            }
        });
        let rows = parse_league_standings(&payload).unwrap();
        assert_eq!(rows[0]["losses"], json!(30));
    }

    #[test]
    fn unexpected_shape_is_none() {
        assert!(parse_league_standings(&json!({"error": "forbidden"})).is_none());
        let no_team = json!({"resultSets": [{"headers": ["W"], "rowSet": [[1]]}]});
        assert!(parse_league_standings(&no_team).is_none());
    }
}
