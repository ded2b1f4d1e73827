use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::ReconcileError;
use crate::normalize::{CanonicalRecord, normalize};
use crate::source::{SourceDescriptor, SourceRegistry};

pub const DEFAULT_MIN_ROWS: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct FallbackAttempt {
    pub source: String,
    pub accepted: bool,
    pub rows: usize,
    pub error: Option<String>,
}

/// The first adequate answer.
#[derive(Debug, Clone, Serialize)]
pub struct SingletonDataset {
    pub source: String,
    pub rows: Vec<CanonicalRecord>,
}

/// A full pass over the chain: the accepted dataset, if any, and every source
/// that was tried on the way.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackRun {
    pub dataset: Option<SingletonDataset>,
    pub attempts: Vec<FallbackAttempt>,
}

enum State {
    TryNext(usize),
    Done(Option<SingletonDataset>),
}

/// Queries sources strictly one after another in registry order and stops at
/// the first one whose normalized rows reach the minimum.
#[derive(Debug, Clone)]
pub struct FallbackFetcher {
    registry: SourceRegistry,
    min_rows: usize,
    min_rows_by_source: BTreeMap<String, usize>,
}

impl FallbackFetcher {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            min_rows: DEFAULT_MIN_ROWS,
            min_rows_by_source: BTreeMap::new(),
        }
    }

    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }

    pub fn with_source_min_rows(mut self, source: impl Into<String>, min_rows: usize) -> Self {
        self.min_rows_by_source.insert(source.into(), min_rows);
        self
    }

    pub fn min_rows_for(&self, source: &str) -> usize {
        self.min_rows_by_source
            .get(source)
            .copied()
            .unwrap_or(self.min_rows)
    }

    pub fn fetch_singleton(&self, query: &str) -> Option<SingletonDataset> {
        self.run(query).dataset
    }

    pub fn run(&self, query: &str) -> FallbackRun {
        let descriptors = self.registry.iter().collect::<Vec<_>>();
        let mut attempts = Vec::new();
        let mut state = State::TryNext(0);

        loop {
            state = match state {
                State::Done(dataset) => return FallbackRun { dataset, attempts },
                State::TryNext(index) if index >= descriptors.len() => {
                    warn!(tried = attempts.len(), "every source failed or was insufficient");
                    State::Done(None)
                }
                State::TryNext(index) => {
                    let descriptor = descriptors[index];
                    info!(source = descriptor.name(), "trying source");
                    match self.attempt(descriptor, query) {
                        Ok(rows) => {
                            info!(source = descriptor.name(), rows = rows.len(), "source accepted");
                            attempts.push(FallbackAttempt {
                                source: descriptor.name().to_string(),
                                accepted: true,
                                rows: rows.len(),
                                error: None,
                            });
                            State::Done(Some(SingletonDataset {
                                source: descriptor.name().to_string(),
                                rows,
                            }))
                        }
                        Err((error, rows)) => {
                            warn!(source = descriptor.name(), error = %error, "source rejected");
                            attempts.push(FallbackAttempt {
                                source: descriptor.name().to_string(),
                                accepted: false,
                                rows,
                                error: Some(error.to_string()),
                            });
                            State::TryNext(index + 1)
                        }
                    }
                }
            };
        }
    }

    fn attempt(
        &self,
        descriptor: &SourceDescriptor,
        query: &str,
    ) -> Result<Vec<CanonicalRecord>, (ReconcileError, usize)> {
        let raws = descriptor
            .fetch_with_timeout(query)
            .map_err(|err| (err, 0))?;

        let mut seen = HashSet::new();
        let rows = raws
            .iter()
            .filter_map(|raw| normalize(raw, descriptor, None))
            .filter(|record| seen.insert(record.identity_key.clone()))
            .collect::<Vec<_>>();

        if rows.is_empty() && !raws.is_empty() {
            return Err((
                ReconcileError::malformed(descriptor.name(), "no row carried an identity field"),
                0,
            ));
        }
        let minimum = self.min_rows_for(descriptor.name());
        if rows.len() < minimum {
            return Err((
                ReconcileError::InsufficientData {
                    source_name: descriptor.name().to_string(),
                    rows: rows.len(),
                    minimum,
                },
                rows.len(),
            ));
        }
        Ok(rows)
    }
}
