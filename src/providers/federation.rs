use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{RawRecord, SourceKind};
use crate::error::ReconcileError;
use crate::http::{HttpClient, HttpRequest};
use crate::matcher::fold_name;
use crate::source::Source;

/// Where a site lists athletes and how its result cards are marked up.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub name: &'static str,
    pub kind: SourceKind,
    pub reliability: f64,
    pub base_url: &'static str,
    /// Tried in order until one yields athletes; `{query}` is replaced by the
    /// url-encoded name.
    pub search_paths: &'static [&'static str],
    pub card_classes: &'static [&'static str],
    /// Output field and the element classes it may be read from.
    pub fields: &'static [(&'static str, &'static [&'static str])],
    pub official: bool,
}

const CARD_FIELDS: &[(&str, &[&str])] = &[
    ("name", &["name", "athlete-name", "player-name"]),
    ("team", &["team", "athlete-team", "player-team"]),
    ("position", &["position", "athlete-position"]),
    ("age", &["age", "athlete-age"]),
];

pub const FPB: SiteProfile = SiteProfile {
    name: "fpb",
    kind: SourceKind::Federation,
    reliability: 0.95,
    base_url: "https://fpb.com.br",
    search_paths: &["/atletas/busca?nome={query}"],
    card_classes: &["athlete-card", "player-item", "atleta-item"],
    fields: CARD_FIELDS,
    official: false,
};

pub const CBB: SiteProfile = SiteProfile {
    name: "cbb",
    kind: SourceKind::Federation,
    reliability: 0.98,
    base_url: "https://cbb.com.br",
    search_paths: &[
        "/atletas/busca?q={query}",
        "/jogadores?nome={query}",
        "/rankings/atletas?search={query}",
    ],
    card_classes: &["player-row", "athlete-item", "jogador-card"],
    fields: &[
        ("name", &["player-name", "athlete-name", "nome"]),
        ("registrationNumber", &["registration", "registro"]),
        ("federation", &["federation", "federacao"]),
    ],
    official: true,
};

pub const BASQUETE_BRASIL: SiteProfile = SiteProfile {
    name: "basqueteBrasil",
    kind: SourceKind::Specialized,
    reliability: 0.85,
    base_url: "https://basquetebrasil.com.br",
    search_paths: &["/busca?q={query}&categoria=atletas"],
    card_classes: &["athlete-card", "player-item", "atleta-item"],
    fields: CARD_FIELDS,
    official: false,
};

pub const ATHLETE_SITES: &[SiteProfile] = &[FPB, CBB, BASQUETE_BRASIL];

pub struct AthleteSiteSource {
    profile: SiteProfile,
    http: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl AthleteSiteSource {
    pub fn new(profile: SiteProfile, http: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self {
            profile,
            http,
            timeout,
        }
    }
}

impl Source for AthleteSiteSource {
    fn fetch(&self, query: &str) -> Result<Option<Vec<RawRecord>>, ReconcileError> {
        let mut last_error = None;
        for path in self.profile.search_paths {
            let url = format!(
                "{}{}",
                self.profile.base_url,
                path.replace("{query}", &encode_query(query))
            );
            let request = HttpRequest::get(url, self.timeout)
                .header("Accept", "text/html,application/json");
            let body = match self.http.get_text(&request) {
                Ok(body) => body,
                Err(err) => {
                    debug!(source = self.profile.name, path, error = %err, "search path failed");
                    last_error = Some(err);
                    continue;
                }
            };
            let athletes = parse_athletes(&self.profile, &body, query);
            if !athletes.is_empty() {
                return Ok(Some(athletes));
            }
        }
        match last_error {
            Some(err) if self.profile.search_paths.len() == 1 => Err(err),
            _ => Ok(None),
        }
    }
}

/// Reads a JSON body (`{"athletes": [...]}` or a bare array) or, failing that,
/// HTML result cards. Only athletes whose name contains every query token are kept.
pub fn parse_athletes(profile: &SiteProfile, body: &str, query: &str) -> Vec<RawRecord> {
    let candidates = match serde_json::from_str::<Value>(body) {
        Ok(payload) => json_athletes(&payload),
        Err(_) => html_athletes(profile, body),
    };
    candidates
        .into_iter()
        .filter(|record| {
            record
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| name_contains_query(name, query))
        })
        .map(|mut record| {
            record.insert("source".to_string(), Value::from(profile.name));
            if profile.official {
                record.insert("official".to_string(), Value::Bool(true));
            }
            record
        })
        .collect()
}

pub fn name_contains_query(name: &str, query: &str) -> bool {
    let name = fold_name(name);
    let tokens = fold_name(query);
    !tokens.is_empty() && tokens.split(' ').all(|token| name.contains(token))
}

fn json_athletes(payload: &Value) -> Vec<RawRecord> {
    let list = match payload {
        Value::Array(items) => Some(items),
        Value::Object(object) => object.get("athletes").and_then(Value::as_array),
        _ => None,
    };
    list.into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .cloned()
        .collect()
}

fn html_athletes(profile: &SiteProfile, html: &str) -> Vec<RawRecord> {
    let tag_re = Regex::new(r#"<[a-zA-Z][a-zA-Z0-9]*\s[^>]*?class\s*=\s*"([^"]*)"[^>]*>"#).unwrap();
    let href_re = Regex::new(r#"<a\s[^>]*?href\s*=\s*"([^"]*)""#).unwrap();

    let has_class = |classes: &str, wanted: &[&str]| {
        classes.split_whitespace().any(|class| wanted.contains(&class))
    };
    let card_starts = tag_re
        .captures_iter(html)
        .filter(|caps| has_class(&caps[1], profile.card_classes))
        .filter_map(|caps| caps.get(0).map(|tag| tag.start()))
        .collect::<Vec<_>>();

    card_starts
        .iter()
        .enumerate()
        .map(|(index, start)| {
            let end = card_starts.get(index + 1).copied().unwrap_or(html.len());
            &html[*start..end]
        })
        .map(|card| {
            let mut record = Map::new();
            for (field, classes) in profile.fields {
                let text = tag_re
                    .captures_iter(card)
                    .skip(1)
                    .find(|caps| has_class(&caps[1], classes))
                    .and_then(|caps| caps.get(0))
                    .map(|tag| element_text(&card[tag.end()..]))
                    .unwrap_or_default();
                if !text.is_empty() {
                    record.insert(field.to_string(), Value::from(text));
                }
            }
            if let Some(href) = href_re.captures(card) {
                record.insert("url".to_string(), Value::from(&href[1]));
            }
            record
        })
        .collect()
}

/// Text up to the element's closing tag, with inline tags removed.
fn element_text(rest: &str) -> String {
    let inline_re = Regex::new(concat!(
        r"^(?s)((?:[^<]",
        r"|<(?:a|b|i|em|strong|span)\b[^>]*>",
        r"|</(?:a|b|i|em|strong)>)*)",
    ))
    .unwrap();
    let tag_re = Regex::new(r"<[^>]*>").unwrap();
    let inner = inline_re
        .captures(rest)
        .and_then(|caps| caps.get(1))
        .map(|inner| inner.as_str())
        .unwrap_or("");
    decode_entities(tag_re.replace_all(inner, "").trim())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn encode_query(query: &str) -> String {
    let mut encoded = String::with_capacity(query.len());
    for byte in query.trim().bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
