use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::domain::FieldOrigin;
use crate::matcher::{MatchPolicy, similarity};
use crate::normalize::CanonicalRecord;

/// Two records judged similar enough to belong to the same entity. Indexes
/// point into the slice handed to [`match_candidates`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCandidate {
    pub a: usize,
    pub b: usize,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedField {
    pub value: Value,
    pub origin: FieldOrigin,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedEntity {
    pub primary_name: String,
    pub identity_key: String,
    pub contributing_sources: Vec<String>,
    pub source_count: usize,
    pub aggregate_confidence: f64,
    pub merged_fields: BTreeMap<String, MergedField>,
}

impl ConsolidatedEntity {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.merged_fields.get(name).map(|field| &field.value)
    }
}

pub fn match_candidates(records: &[CanonicalRecord], policy: &MatchPolicy) -> Vec<MatchCandidate> {
    let mut candidates = Vec::new();
    for a in 0..records.len() {
        for b in (a + 1)..records.len() {
            let score = similarity(&records[a], &records[b]);
            if score >= policy.threshold {
                candidates.push(MatchCandidate {
                    a,
                    b,
                    similarity: score,
                });
            }
        }
    }
    candidates
}

/// Groups records into connected components of the match graph and merges each
/// group. Linking is transitive, so two dissimilar records can share a group
/// through an intermediate record.
pub fn consolidate(records: &[CanonicalRecord], policy: &MatchPolicy) -> Vec<ConsolidatedEntity> {
    let mut sets = DisjointSet::new(records.len());
    for candidate in match_candidates(records, policy) {
        sets.union(candidate.a, candidate.b);
    }

    let mut groups: BTreeMap<usize, Vec<&CanonicalRecord>> = BTreeMap::new();
    let mut first_seen: BTreeMap<usize, usize> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        let root = sets.find(index);
        first_seen.entry(root).or_insert(index);
        groups.entry(root).or_default().push(record);
    }

    let mut ordered = groups.into_iter().collect::<Vec<_>>();
    ordered.sort_by_key(|(root, _)| first_seen[root]);

    let mut entities = ordered
        .into_iter()
        .map(|(_, members)| merge_group(members))
        .collect::<Vec<_>>();
    entities.sort_by(|a, b| {
        b.aggregate_confidence
            .total_cmp(&a.aggregate_confidence)
            .then_with(|| b.source_count.cmp(&a.source_count))
    });
    entities
}

fn merge_group(mut members: Vec<&CanonicalRecord>) -> ConsolidatedEntity {
    members.sort_by(|a, b| {
        b.reliability
            .total_cmp(&a.reliability)
            .then_with(|| b.match_confidence.total_cmp(&a.match_confidence))
    });

    let mut contributing_sources: Vec<String> = Vec::new();
    for member in &members {
        if !contributing_sources.contains(&member.source_name) {
            contributing_sources.push(member.source_name.clone());
        }
    }

    let weighted = members
        .iter()
        .map(|member| member.match_confidence * member.reliability)
        .sum::<f64>();
    let aggregate_confidence = (weighted / members.len() as f64).min(1.0);

    // Source-reported values win over defaults regardless of reliability.
    let mut merged_fields = BTreeMap::new();
    for wanted in [FieldOrigin::Source, FieldOrigin::Defaulted] {
        for member in &members {
            for (name, field) in &member.fields {
                if field.origin != wanted || field.is_empty() || merged_fields.contains_key(name) {
                    continue;
                }
                merged_fields.insert(
                    name.clone(),
                    MergedField {
                        value: field.value.clone(),
                        origin: field.origin,
                        source: member.source_name.clone(),
                    },
                );
            }
        }
    }

    let primary = members[0];
    ConsolidatedEntity {
        primary_name: primary.display_name().to_string(),
        identity_key: primary.identity_key.clone(),
        source_count: contributing_sources.len(),
        contributing_sources,
        aggregate_confidence,
        merged_fields,
    }
}

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = node;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a == root_b {
            return;
        }
        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }
    }
}
