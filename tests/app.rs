use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde_json::{Value, json};
use tempfile::TempDir;

use prospect_reconciler::app::{App, SearchOptions, StandingsOptions};
use prospect_reconciler::config::{Config, ConfigLoader, SearchSection};
use prospect_reconciler::domain::{RawRecord, Season, SourceKind};
use prospect_reconciler::normalize::SchemaHint;
use prospect_reconciler::search::SourceStatus;
use prospect_reconciler::source::{Source, SourceDescriptor, SourceRegistry, source_fn};

const TEAMS: [&str; 30] = [
    "ATL", "BOS", "BKN", "CHA", "CHI", "CLE", "DAL", "DEN", "DET", "GSW", "HOU", "IND",
    "LAC", "LAL", "MEM", "MIA", "MIL", "MIN", "NOP", "NYK", "OKC", "ORL", "PHI", "PHX",
    "POR", "SAC", "SAS", "TOR", "UTA", "WAS",
];

fn raw(value: Value) -> RawRecord {
    value.as_object().unwrap().clone()
}

fn app() -> App {
    let config = ConfigLoader::resolve_config(Config {
        search: SearchSection {
            deadline_ms: None,
            polite_delay_ms: Some(0),
        },
        ..Config::default()
    })
    .unwrap();
    App::new(config)
}

fn descriptor(
    name: &str,
    reliability: f64,
    schema: SchemaHint,
    source: Arc<dyn Source>,
) -> SourceDescriptor {
    SourceDescriptor::new(
        name,
        SourceKind::Federation,
        reliability,
        Duration::from_secs(5),
        schema,
        source,
    )
    .unwrap()
}

#[test]
fn search_consolidates_each_name_separately() {
    let registry = SourceRegistry::new(vec![
        descriptor(
            "fpb",
            0.95,
            SchemaHint::Athlete,
            source_fn(|query| {
                let row = json!({"name": query, "team": "Pinheiros", "position": "Armador"});
                Ok(Some(vec![raw(row)]))
            }),
        ),
        descriptor(
            "cbb",
            0.9,
            SchemaHint::Athlete,
            source_fn(|query| Ok(Some(vec![raw(json!({"name": query, "team": "Franca"}))]))),
        ),
    ]);
    let names = vec!["Lucas Pereira".to_string(), "Marcos Alves".to_string()];

    let result = app().search(registry, &names, &SearchOptions::default());
    assert_eq!(result.results.len(), 2);

    let first = &result.results[0];
    assert_eq!(first.query, "Lucas Pereira");
    assert_eq!(first.successful_sources, 2);
    assert_eq!(first.failed_sources, 0);
    assert!(first.sources.iter().all(|source| source.status == SourceStatus::Success));
    assert_eq!(first.entities.len(), 1);

    let entity = &first.entities[0];
    assert_eq!(entity.source_count, 2);
    assert_eq!(entity.field("team"), Some(&json!("Pinheiros")));
    assert_eq!(entity.field("position"), Some(&json!("Armador")));
    assert_eq!(result.results[1].entities[0].primary_name, "Marcos Alves");
}

#[test]
fn standings_honour_the_output_override() {
    let temp = TempDir::new().unwrap();
    let output = Utf8PathBuf::from_path_buf(temp.path().join("standings.json")).unwrap();
    let rows = TEAMS
        .iter()
        .zip(0..30u32)
        .map(|(team, idx)| raw(json!({"team": team, "wins": 40 - idx, "losses": 20 + idx})))
        .collect::<Vec<_>>();
    let registry = SourceRegistry::new(vec![descriptor(
        "nba-stats",
        0.95,
        SchemaHint::Standings,
        source_fn(move |_| Ok(Some(rows.clone()))),
    )]);
    let options = StandingsOptions {
        season: Season::from_start_year(2024),
        output: Some(output.clone()),
        force: false,
    };

    let outcome = app().update_standings(registry, &options).unwrap();
    assert!(outcome.wrote());
    let written: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["season"], json!("2024-25"));
    assert_eq!(written["lottery"][0]["team"], json!("WAS"));
    assert_eq!(written["playoff"].as_array().unwrap().len(), 16);
}
