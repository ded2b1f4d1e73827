use crate::standings::StandingsSnapshot;

/// True when the ranked groups differ. Timestamps, season and source name are
/// ignored; only the lottery and playoff rows are compared, in order.
pub fn has_changed(previous: &StandingsSnapshot, candidate: &StandingsSnapshot) -> bool {
    previous.lottery != candidate.lottery || previous.playoff != candidate.playoff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standings::StandingRow;

    fn row(team: &str, wins: u32, losses: u32) -> StandingRow {
        StandingRow {
            team: team.parse().unwrap(),
            wins,
            losses,
        }
    }

    fn snapshot(updated_at: &str, source: &str, lottery: Vec<StandingRow>) -> StandingsSnapshot {
        StandingsSnapshot {
            updated_at: updated_at.to_string(),
            season: "2025-26".parse().unwrap(),
            source: source.to_string(),
            lottery,
            playoff: vec![row("BOS", 50, 10)],
        }
    }

    #[test]
    fn metadata_only_changes_are_ignored() {
        let a = snapshot("2025-01-01T00:00:00Z", "nba-stats", vec![row("DET", 10, 50)]);
        let b = snapshot("2025-01-02T00:00:00Z", "cdn-live", vec![row("DET", 10, 50)]);
        assert!(!has_changed(&a, &b));
    }

    #[test]
    fn record_change_is_detected() {
        let a = snapshot("t", "s", vec![row("DET", 10, 50)]);
        let b = snapshot("t", "s", vec![row("DET", 11, 50)]);
        assert!(has_changed(&a, &b));
    }

    #[test]
    fn order_change_is_detected() {
        let a = snapshot("t", "s", vec![row("DET", 10, 50), row("WAS", 10, 50)]);
        let b = snapshot("t", "s", vec![row("WAS", 10, 50), row("DET", 10, 50)]);
        assert!(has_changed(&a, &b));
    }
}
