use serde::Serialize;
use tracing::warn;

pub const LOTTERY_SIZE: usize = 14;
pub const PLAYOFF_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPolicy {
    pub split_index: usize,
    pub expected_a: Option<usize>,
    pub expected_b: Option<usize>,
}

impl Default for GroupPolicy {
    fn default() -> Self {
        Self {
            split_index: LOTTERY_SIZE,
            expected_a: Some(LOTTERY_SIZE),
            expected_b: Some(PLAYOFF_SIZE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Groups<T> {
    pub group_a: Vec<T>,
    pub group_b: Vec<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Sorts ascending by `metric`, breaking exact ties with `tie_break` (also
/// ascending) and then input order, and splits at `policy.split_index`.
/// Unexpected group sizes are reported as warnings; the groups are still returned.
pub fn derive_groups<T, M, B>(
    rows: Vec<T>,
    metric: M,
    tie_break: B,
    policy: &GroupPolicy,
) -> Groups<T>
where
    M: Fn(&T) -> f64,
    B: Fn(&T) -> f64,
{
    let mut keyed = rows
        .into_iter()
        .map(|row| (metric(&row), tie_break(&row), row))
        .collect::<Vec<_>>();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.total_cmp(&b.1)));

    let mut sorted = keyed.into_iter().map(|(_, _, row)| row).collect::<Vec<_>>();
    let split = policy.split_index.min(sorted.len());
    let group_b = sorted.split_off(split);
    let group_a = sorted;

    let mut warnings = Vec::new();
    for (label, actual, expected) in [
        ("first", group_a.len(), policy.expected_a),
        ("second", group_b.len(), policy.expected_b),
    ] {
        if let Some(expected) = expected {
            if actual != expected {
                let message = format!("{label} group has {actual} rows, expected {expected}");
                warn!("{message}");
                warnings.push(message);
            }
        }
    }

    Groups {
        group_a,
        group_b,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_ascending_and_splits() {
        let rows = vec![5.0, 1.0, 3.0, 2.0, 4.0];
        let policy = GroupPolicy {
            split_index: 2,
            expected_a: Some(2),
            expected_b: Some(3),
        };
        let groups = derive_groups(rows, |v| *v, |_| 0.0, &policy);
        assert_eq!(groups.group_a, vec![1.0, 2.0]);
        assert_eq!(groups.group_b, vec![3.0, 4.0, 5.0]);
        assert!(groups.warnings.is_empty());
    }

    #[test]
    fn ties_use_secondary_then_input_order() {
        let rows = vec![("x", 0.5, 30), ("y", 0.5, 20), ("z", 0.5, 20), ("w", 0.1, 5)];
        let policy = GroupPolicy {
            split_index: 4,
            expected_a: None,
            expected_b: None,
        };
        for _ in 0..3 {
            let groups = derive_groups(rows.clone(), |r| r.1, |r| r.2 as f64, &policy);
            let names = groups.group_a.iter().map(|r| r.0).collect::<Vec<_>>();
            assert_eq!(names, vec!["w", "y", "z", "x"]);
        }
    }

    #[test]
    fn short_input_warns_but_returns() {
        let rows = (0..10).map(|v| v as f64).collect::<Vec<_>>();
        let groups = derive_groups(rows, |v| *v, |_| 0.0, &GroupPolicy::default());
        assert_eq!(groups.group_a.len(), 10);
        assert!(groups.group_b.is_empty());
        assert_eq!(groups.warnings.len(), 2);
    }
}
