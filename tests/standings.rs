use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::{Value, json};
use tempfile::TempDir;

use prospect_reconciler::change::has_changed;
use prospect_reconciler::domain::{RawRecord, Season, SourceKind};
use prospect_reconciler::error::ReconcileError;
use prospect_reconciler::fallback::FallbackFetcher;
use prospect_reconciler::normalize::SchemaHint;
use prospect_reconciler::rank::GroupPolicy;
use prospect_reconciler::source::{Source, SourceDescriptor, SourceRegistry, source_fn};
use prospect_reconciler::standings::{
    StandingsRequest, UpdateOutcome, build_snapshot, update_standings,
};

const TEAMS: [&str; 30] = [
    "DET", "WAS", "CHO", "POR", "UTA", "SAS", "TOR", "BRK", "NOP", "PHI", "CHI", "DAL",
    "ATL", "SAC", "PHO", "MIA", "ORL", "GSW", "MIN", "LAL", "MEM", "IND", "MIL", "HOU",
    "LAC", "DEN", "NYK", "CLE", "OKC", "BOS",
];

fn league() -> Vec<RawRecord> {
    TEAMS
        .iter()
        .enumerate()
        .map(|(idx, team)| {
            let (wins, losses) = match *team {
                "DET" => (10, 50),
                "BRK" => (20, 40),
                "BOS" => (50, 10),
                _ => (10 + idx, 50 - idx),
            };
            json!({"team": team, "wins": wins, "losses": losses})
                .as_object()
                .unwrap()
                .clone()
        })
        .collect()
}

fn standings_source(name: &str, source: Arc<dyn Source>) -> SourceDescriptor {
    SourceDescriptor::new(
        name,
        SourceKind::OfficialApi,
        0.95,
        Duration::from_secs(5),
        SchemaHint::Standings,
        source,
    )
    .unwrap()
}

fn fetcher(rows: Vec<RawRecord>) -> FallbackFetcher {
    let registry = SourceRegistry::new(vec![
        standings_source(
            "nba-stats",
            source_fn(|_| {
                Err(ReconcileError::HttpStatus {
                    status: 403,
                    message: "forbidden".to_string(),
                })
            }),
        ),
        standings_source("cdn-live", source_fn(move |_| Ok(Some(rows.clone())))),
    ]);
    FallbackFetcher::new(registry)
}

fn request(temp: &TempDir, force: bool) -> StandingsRequest {
    StandingsRequest {
        season: "2025-26".parse().unwrap(),
        output: Utf8PathBuf::from_path_buf(temp.path().join("public/data/nba_standings.json"))
            .unwrap(),
        force,
        policy: GroupPolicy::default(),
    }
}

fn read_json(request: &StandingsRequest) -> Value {
    serde_json::from_str(&fs::read_to_string(request.output.as_std_path()).unwrap()).unwrap()
}

#[test]
fn writes_lottery_and_playoff_with_canonical_codes() {
    let temp = TempDir::new().unwrap();
    let request = request(&temp, false);

    let outcome = update_standings(&fetcher(league()), &request).unwrap();
    assert!(outcome.wrote());

    let written = read_json(&request);
    assert_eq!(written["season"], json!("2025-26"));
    assert_eq!(written["source"], json!("cdn-live"));
    assert!(written["updatedAt"].as_str().is_some());

    let lottery = written["lottery"].as_array().unwrap();
    let playoff = written["playoff"].as_array().unwrap();
    assert_eq!(lottery.len(), 14);
    assert_eq!(playoff.len(), 16);
    assert_eq!(lottery[0], json!({"team": "DET", "wins": 10, "losses": 50}));
    assert_eq!(playoff.last().unwrap()["team"], json!("BOS"));

    let codes = lottery
        .iter()
        .chain(playoff)
        .map(|row| row["team"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert!(codes.contains(&"BKN".to_string()));
    assert!(codes.contains(&"CHA".to_string()));
    assert!(codes.contains(&"PHX".to_string()));
    assert!(!codes.iter().any(|code| ["BRK", "CHO", "PHO"].contains(&code.as_str())));
    let brooklyn = lottery.iter().find(|row| row["team"] == json!("BKN")).unwrap();
    assert_eq!(brooklyn["wins"], json!(20));
}

#[test]
fn unchanged_data_is_not_rewritten() {
    let temp = TempDir::new().unwrap();
    let request = request(&temp, false);

    update_standings(&fetcher(league()), &request).unwrap();
    let first = fs::read_to_string(request.output.as_std_path()).unwrap();

    let second = update_standings(&fetcher(league()), &request).unwrap();
    assert_matches!(second, UpdateOutcome::Unchanged { .. });
    assert_eq!(fs::read_to_string(request.output.as_std_path()).unwrap(), first);
}

#[test]
fn force_rewrites_identical_data() {
    let temp = TempDir::new().unwrap();
    update_standings(&fetcher(league()), &request(&temp, false)).unwrap();
    let forced = update_standings(&fetcher(league()), &request(&temp, true)).unwrap();
    assert!(forced.wrote());
}

#[test]
fn changed_record_is_written() {
    let temp = TempDir::new().unwrap();
    let request = request(&temp, false);
    update_standings(&fetcher(league()), &request).unwrap();

    let mut rows = league();
    rows[0].insert("wins".to_string(), json!(11));
    rows[0].insert("losses".to_string(), json!(50));
    let outcome = update_standings(&fetcher(rows), &request).unwrap();
    assert!(outcome.wrote());
    assert_eq!(read_json(&request)["lottery"][0]["wins"], json!(11));
}

#[test]
fn corrupted_previous_file_is_overwritten() {
    let temp = TempDir::new().unwrap();
    let request = request(&temp, false);
    fs::create_dir_all(request.output.parent().unwrap().as_std_path()).unwrap();
    fs::write(request.output.as_std_path(), "{\"lottery\": [").unwrap();

    let outcome = update_standings(&fetcher(league()), &request).unwrap();
    assert!(outcome.wrote());
    assert_eq!(read_json(&request)["lottery"].as_array().unwrap().len(), 14);
}

#[test]
fn oversized_counts_do_not_abort_the_update() {
    let temp = TempDir::new().unwrap();
    let request = request(&temp, false);
    let rows = TEAMS
        .iter()
        .map(|team| {
            json!({"team": team, "wins": 4_294_967_295u64, "losses": 5})
                .as_object()
                .unwrap()
                .clone()
        })
        .collect::<Vec<_>>();

    let outcome = update_standings(&fetcher(rows), &request).unwrap();
    assert!(outcome.wrote());
    let written = read_json(&request);
    assert_eq!(written["lottery"].as_array().unwrap().len(), 14);
    assert_eq!(written["lottery"][0]["wins"], json!(4_294_967_295u64));
}

#[test]
fn total_failure_without_previous_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let request = request(&temp, false);
    let result = update_standings(&fetcher(league()[..5].to_vec()), &request);
    assert_matches!(result, Err(ReconcileError::TotalAcquisitionFailure));
    assert!(!request.output.exists());
}

#[test]
fn total_failure_keeps_existing_file() {
    let temp = TempDir::new().unwrap();
    let request = request(&temp, false);
    update_standings(&fetcher(league()), &request).unwrap();
    let before = fs::read_to_string(request.output.as_std_path()).unwrap();

    let calls = Arc::new(Mutex::new(0usize));
    let counter = calls.clone();
    let registry = SourceRegistry::new(vec![standings_source(
        "nba-stats",
        source_fn(move |_| {
            *counter.lock().unwrap() += 1;
            Ok(None)
        }),
    )]);
    let outcome = update_standings(&FallbackFetcher::new(registry), &request).unwrap();
    assert_matches!(outcome, UpdateOutcome::NoData { kept_existing: true, .. });
    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(fs::read_to_string(request.output.as_std_path()).unwrap(), before);
}

#[test]
fn derived_snapshot_never_differs_from_itself() {
    let season: Season = "2025-26".parse().unwrap();
    let fetcher = fetcher(league());
    let dataset = fetcher.fetch_singleton(season.as_str()).unwrap();
    let snapshot = build_snapshot(&dataset.rows, &season, &dataset.source, &GroupPolicy::default());
    assert!(!has_changed(&snapshot, &snapshot));

    let again = build_snapshot(&dataset.rows, &season, &dataset.source, &GroupPolicy::default());
    assert!(!has_changed(&snapshot, &again));
}

#[test]
fn equal_win_pct_breaks_on_wins() {
    let rows = vec![
        json!({"team": "NYK", "wins": 30, "losses": 30}),
        json!({"team": "ATL", "wins": 20, "losses": 20}),
        json!({"team": "MIA", "wins": 25, "losses": 25}),
    ]
    .into_iter()
    .map(|value| value.as_object().unwrap().clone())
    .collect::<Vec<_>>();
    let registry = SourceRegistry::new(vec![standings_source(
        "custom-source",
        source_fn(move |_| Ok(Some(rows.clone()))),
    )]);
    let fetcher = FallbackFetcher::new(registry).with_min_rows(3);
    let season: Season = "2025-26".parse().unwrap();
    let policy = GroupPolicy {
        split_index: 2,
        expected_a: Some(2),
        expected_b: Some(1),
    };

    for _ in 0..5 {
        let dataset = fetcher.fetch_singleton(season.as_str()).unwrap();
        let snapshot = build_snapshot(&dataset.rows, &season, &dataset.source, &policy);
        let lottery = snapshot.lottery.iter().map(|row| row.team.as_str()).collect::<Vec<_>>();
        assert_eq!(lottery, vec!["ATL", "MIA"]);
        assert_eq!(snapshot.playoff[0].team.as_str(), "NYK");
    }
}
