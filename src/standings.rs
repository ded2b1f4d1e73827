use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::change::has_changed;
use crate::domain::{Season, TeamCode};
use crate::error::ReconcileError;
use crate::fallback::{FallbackAttempt, FallbackFetcher};
use crate::normalize::{CanonicalRecord, as_count, as_float};
use crate::rank::{GroupPolicy, derive_groups};
use crate::store::{PreviousSnapshot, SnapshotStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingRow {
    pub team: TeamCode,
    pub wins: u32,
    pub losses: u32,
}

/// The persisted standings artifact. Field order matches the written file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsSnapshot {
    pub updated_at: String,
    pub season: Season,
    pub source: String,
    pub lottery: Vec<StandingRow>,
    pub playoff: Vec<StandingRow>,
}

struct RankedRow {
    row: StandingRow,
    win_pct: f64,
}

impl RankedRow {
    fn from_record(record: &CanonicalRecord) -> Option<Self> {
        let team = record.field("team")?.as_str()?.parse().ok()?;
        let wins = record.field("wins").and_then(as_count).unwrap_or(0);
        let losses = record.field("losses").and_then(as_count).unwrap_or(0);
        let win_pct = record
            .field("winPct")
            .and_then(as_float)
            .unwrap_or_else(|| win_pct(wins, losses));
        Some(Self {
            row: StandingRow { team, wins, losses },
            win_pct,
        })
    }
}

/// `wins / games`, or 0 before any game was played.
pub fn win_pct(wins: u32, losses: u32) -> f64 {
    let games = u64::from(wins) + u64::from(losses);
    if games == 0 {
        return 0.0;
    }
    f64::from(wins) / games as f64
}

/// Ranks canonical standings rows worst record first and splits them into the
/// lottery and playoff groups.
pub fn build_snapshot(
    records: &[CanonicalRecord],
    season: &Season,
    source: &str,
    policy: &GroupPolicy,
) -> StandingsSnapshot {
    let rows = records
        .iter()
        .filter_map(RankedRow::from_record)
        .collect::<Vec<_>>();
    let groups = derive_groups(rows, |row| row.win_pct, |row| f64::from(row.row.wins), policy);
    StandingsSnapshot {
        updated_at: chrono::Utc::now().to_rfc3339(),
        season: season.clone(),
        source: source.to_string(),
        lottery: groups.group_a.into_iter().map(|ranked| ranked.row).collect(),
        playoff: groups.group_b.into_iter().map(|ranked| ranked.row).collect(),
    }
}

#[derive(Debug, Clone)]
pub struct StandingsRequest {
    pub season: Season,
    pub output: Utf8PathBuf,
    pub force: bool,
    pub policy: GroupPolicy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Written {
        path: Utf8PathBuf,
        snapshot: StandingsSnapshot,
        attempts: Vec<FallbackAttempt>,
    },
    Unchanged {
        path: Utf8PathBuf,
        source: String,
        attempts: Vec<FallbackAttempt>,
    },
    NoData {
        path: Utf8PathBuf,
        kept_existing: bool,
        attempts: Vec<FallbackAttempt>,
    },
}

impl UpdateOutcome {
    pub fn wrote(&self) -> bool {
        matches!(self, UpdateOutcome::Written { .. })
    }
}

/// Fetches one standings table through the fallback chain and persists it when
/// it differs from the file already on disk (or when forced). Losing every
/// source is only an error when there is no previous file to fall back on.
pub fn update_standings(
    fetcher: &FallbackFetcher,
    request: &StandingsRequest,
) -> Result<UpdateOutcome, ReconcileError> {
    info!(season = request.season.as_str(), "updating standings");
    let store = SnapshotStore::new(&request.output);

    let run = fetcher.run(request.season.as_str());
    let attempts = run.attempts;
    let Some(dataset) = run.dataset else {
        let kept_existing = store.exists();
        if !kept_existing {
            return Err(ReconcileError::TotalAcquisitionFailure);
        }
        warn!(path = %request.output, "no source produced standings, keeping existing file");
        return Ok(UpdateOutcome::NoData {
            path: request.output.clone(),
            kept_existing,
            attempts,
        });
    };

    let snapshot = build_snapshot(&dataset.rows, &request.season, &dataset.source, &request.policy);

    if !request.force {
        match store.read()? {
            PreviousSnapshot::Present(previous) if !has_changed(&previous, &snapshot) => {
                info!(path = %request.output, "no changes detected, use --force to overwrite");
                return Ok(UpdateOutcome::Unchanged {
                    path: request.output.clone(),
                    source: dataset.source,
                    attempts,
                });
            }
            PreviousSnapshot::Corrupt(reason) => {
                warn!(
                    path = %request.output,
                    reason = %reason,
                    "previous standings unreadable, overwriting"
                );
            }
            _ => {}
        }
    }

    store.write(&snapshot)?;
    info!(
        path = %request.output,
        source = snapshot.source.as_str(),
        lottery = snapshot.lottery.len(),
        playoff = snapshot.playoff.len(),
        "standings written"
    );
    Ok(UpdateOutcome::Written {
        path: request.output.clone(),
        snapshot,
        attempts,
    })
}
