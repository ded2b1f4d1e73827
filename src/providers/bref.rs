use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::{RawRecord, Season};
use crate::error::ReconcileError;
use crate::http::{HttpClient, HttpRequest};
use crate::source::Source;

pub const NAME: &str = "basketball-reference";

const BREF_BASE: &str = "https://www.basketball-reference.com";

/// Conference standings tables scraped from basketball-reference.com.
pub struct BasketballReferenceSource {
    http: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl BasketballReferenceSource {
    pub fn new(http: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

impl Source for BasketballReferenceSource {
    fn fetch(&self, season: &str) -> Result<Option<Vec<RawRecord>>, ReconcileError> {
        let season: Season = season.parse()?;
        let url = format!("{BREF_BASE}/leagues/NBA_{}_standings.html", season.end_year());
        let request = HttpRequest::get(url, self.timeout)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Referer", format!("{BREF_BASE}/"));
        let html = self.http.get_text(&request)?;
        let rows = parse_standings_html(&html);
        Ok((!rows.is_empty()).then_some(rows))
    }
}

/// Rows of the `confs_standings_E` and `confs_standings_W` tables. The team code
/// comes from the `/teams/XXX/` link, falling back to the link text.
pub fn parse_standings_html(html: &str) -> Vec<RawRecord> {
    let table_re =
        Regex::new(r#"(?s)<table[^>]*id="confs_standings_[EW]"[^>]*>(.*?)</table>"#).unwrap();
    let row_re = Regex::new(r"(?s)<tr([^>]*)>(.*?)</tr>").unwrap();
    let team_re = Regex::new(concat!(
        r#"(?s)<th[^>]*data-stat="team_name"[^>]*>"#,
        r#".*?<a[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#,
    ))
    .unwrap();
    let abbr_re = Regex::new(r"/teams/(\w{2,4})/").unwrap();
    let wins_re = Regex::new(r#"(?s)<td[^>]*data-stat="wins"[^>]*>(.*?)</td>"#).unwrap();
    let losses_re = Regex::new(r#"(?s)<td[^>]*data-stat="losses"[^>]*>(.*?)</td>"#).unwrap();

    let mut rows = Vec::new();
    for table in table_re.captures_iter(html) {
        for row in row_re.captures_iter(&table[1]) {
            if row[1].contains("thead") {
                continue;
            }
            let body = &row[2];
            let Some(anchor) = team_re.captures(body) else {
                continue;
            };
            let team = abbr_re
                .captures(&anchor[1])
                .map(|abbr| abbr[1].to_string())
                .unwrap_or_else(|| strip_tags(&anchor[2]));
            if team.is_empty() {
                continue;
            }
            let count = |re: &Regex| {
                re.captures(body)
                    .and_then(|cell| strip_tags(&cell[1]).parse::<u32>().ok())
                    .unwrap_or(0)
            };

            let mut record = Map::new();
            record.insert("team".to_string(), Value::from(team));
            record.insert("wins".to_string(), Value::from(count(&wins_re)));
            record.insert("losses".to_string(), Value::from(count(&losses_re)));
            rows.push(record);
        }
    }
    rows
}

fn strip_tags(fragment: &str) -> String {
    let tag_re = Regex::new(r"<[^>]*>").unwrap();
    tag_re.replace_all(fragment, "").trim().to_string()
}
