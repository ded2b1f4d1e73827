use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::domain::RawRecord;
use crate::error::ReconcileError;
use crate::http::{HttpClient, HttpRequest};
use crate::source::Source;

/// The two public NBA JSON feeds that always describe the current season.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveFeed {
    CdnLive,
    DataNba,
}

impl LiveFeed {
    pub fn name(self) -> &'static str {
        match self {
            LiveFeed::CdnLive => "cdn-live",
            LiveFeed::DataNba => "data-nba",
        }
    }

    fn url(self) -> &'static str {
        match self {
            LiveFeed::CdnLive => {
                "https://cdn.nba.com/static/json/liveData/standings/leagueStandings.json"
            }
            LiveFeed::DataNba => "https://data.nba.com/prod/v2/current/standings_all.json",
        }
    }

    fn teams_pointer(self) -> &'static str {
        match self {
            LiveFeed::CdnLive => "/league/standings/teams",
            LiveFeed::DataNba => "/league/standard/teams",
        }
    }
}

pub struct NbaLiveSource {
    feed: LiveFeed,
    http: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl NbaLiveSource {
    pub fn new(feed: LiveFeed, http: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self { feed, http, timeout }
    }
}

impl Source for NbaLiveSource {
    fn fetch(&self, _season: &str) -> Result<Option<Vec<RawRecord>>, ReconcileError> {
        let mut request = HttpRequest::get(self.feed.url(), self.timeout);
        if self.feed == LiveFeed::DataNba {
            request = request
                .header("Origin", "https://www.nba.com")
                .header("Referer", "https://www.nba.com/");
        }
        let payload = self.http.get_json(&request)?;
        let rows = parse_feed(self.feed, &payload).ok_or_else(|| {
            let message = format!("no array at {}", self.feed.teams_pointer());
            ReconcileError::malformed(self.feed.name(), message)
        })?;
        Ok((!rows.is_empty()).then_some(rows))
    }
}

pub fn parse_feed(feed: LiveFeed, payload: &Value) -> Option<Vec<RawRecord>> {
    let teams = payload.pointer(feed.teams_pointer())?.as_array()?;
    Some(teams.iter().filter_map(team_record).collect())
}

fn team_record(team: &Value) -> Option<RawRecord> {
    let tricode = [
        "/teamTricode",
        "/tricode",
        "/teamSitesOnly/teamTricode",
        "/teamTriCode",
        "/teamCode",
    ]
    .iter()
    .filter_map(|pointer| team.pointer(pointer))
    .filter_map(Value::as_str)
    .find(|code| !code.trim().is_empty())?;

    let mut record = Map::new();
    record.insert("team".to_string(), Value::from(tricode));
    for (key, aliases) in [
        ("wins", &["win"][..]),
        ("losses", &["loss"][..]),
        ("winPct", &["winPct"][..]),
        ("conf", &["confName", "conference"][..]),
        ("confRank", &["confRank", "conferenceRank"][..]),
    ] {
        if let Some(value) = aliases
            .iter()
            .filter_map(|alias| team.get(*alias))
            .find(|value| !value.is_null())
        {
            record.insert(key.to_string(), value.clone());
        }
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_cdn_feed() {
        let payload = json!({"league": {"standings": {"teams": [
            {"teamTricode": "OKC", "win": "55", "loss": "12", "winPct": ".821", "confName": "West"},
            {"teamName": "unknown"}
        ]}}});
        let rows = parse_feed(LiveFeed::CdnLive, &payload).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["team"], json!("OKC"));
        assert_eq!(rows[0]["wins"], json!("55"));
        assert_eq!(rows[0]["conf"], json!("West"));
    }

    #[test]
    fn data_nba_reads_site_tricode() {
        let payload = json!({"league": {"standard": {"teams": [
            {"teamSitesOnly": {"teamTricode": "BRK"}, "win": 20, "loss": 40, "confRank": "13"}
        ]}}});
        let rows = parse_feed(LiveFeed::DataNba, &payload).unwrap();
        assert_eq!(rows[0]["team"], json!("BRK"));
        assert_eq!(rows[0]["confRank"], json!("13"));
    }

    #[test]
    fn wrong_feed_shape_is_none() {
        let payload = json!({"league": {"standard": {"teams": []}}});
        assert!(parse_feed(LiveFeed::CdnLive, &payload).is_none());
    }
}
