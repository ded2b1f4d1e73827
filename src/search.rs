use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::domain::{RawRecord, SourceKind};
use crate::error::ReconcileError;
use crate::normalize::{CanonicalRecord, normalize};
use crate::source::{SourceDescriptor, SourceRegistry};

pub type RawCache = TtlCache<Vec<RawRecord>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub kind: SourceKind,
    pub reliability: f64,
    pub status: SourceStatus,
    pub records: Vec<CanonicalRecord>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl SourceReport {
    fn success(
        descriptor: &SourceDescriptor,
        records: Vec<CanonicalRecord>,
        elapsed: Duration,
    ) -> Self {
        Self {
            source: descriptor.name().to_string(),
            kind: descriptor.kind(),
            reliability: descriptor.reliability(),
            status: SourceStatus::Success,
            records,
            error: None,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    fn failure(descriptor: &SourceDescriptor, error: &ReconcileError, elapsed: Duration) -> Self {
        warn!(source = descriptor.name(), error = %error, "source failed");
        Self {
            source: descriptor.name().to_string(),
            kind: descriptor.kind(),
            reliability: descriptor.reliability(),
            status: SourceStatus::Failure,
            records: Vec::new(),
            error: Some(error.to_string()),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SourceStatus::Success
    }
}

/// Per-source provenance of one search. Always well formed, even when every
/// source failed.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub per_source: Vec<SourceReport>,
    pub elapsed_ms: u64,
}

impl SearchOutcome {
    pub fn successful(&self) -> impl Iterator<Item = &SourceReport> {
        self.per_source.iter().filter(|report| report.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &SourceReport> {
        self.per_source.iter().filter(|report| !report.is_success())
    }

    pub fn records(&self) -> Vec<CanonicalRecord> {
        self.per_source
            .iter()
            .flat_map(|report| report.records.iter().cloned())
            .collect()
    }
}

/// Raw rows from one fetch. Only fresh rows are written back to the cache.
struct Fetched {
    raws: Vec<RawRecord>,
    from_cache: bool,
}

type Settled = (usize, Result<Fetched, ReconcileError>, Duration);

/// Fans a query out to every registered source at once, bounding each by its own
/// timeout and the whole call by an optional deadline.
#[derive(Debug, Clone)]
pub struct ParallelSearcher {
    registry: SourceRegistry,
    cache: Option<Arc<RawCache>>,
    deadline: Option<Duration>,
}

impl ParallelSearcher {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            cache: None,
            deadline: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<RawCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn search(&self, query: &str) -> SearchOutcome {
        let started = Instant::now();
        let descriptors = self.registry.iter().cloned().collect::<Vec<_>>();
        let mut slots: Vec<Option<SourceReport>> = (0..descriptors.len()).map(|_| None).collect();
        let (tx, rx) = mpsc::channel::<Settled>();

        for (index, descriptor) in descriptors.iter().enumerate() {
            let tx = tx.clone();
            let desc = descriptor.clone();
            let query = query.to_string();
            let cache = self.cache.clone();
            let spawned = thread::Builder::new()
                .name(format!("search-{}", descriptor.name()))
                .spawn(move || {
                    let fetch_started = Instant::now();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        fetch_raw(&desc, &query, cache.as_deref())
                    }))
                    .unwrap_or_else(|_| {
                        Err(ReconcileError::unavailable(desc.name(), "source panicked"))
                    });
                    let _ = tx.send((index, result, fetch_started.elapsed()));
                });
            if let Err(err) = spawned {
                let error = ReconcileError::unavailable(descriptor.name(), err.to_string());
                slots[index] = Some(SourceReport::failure(descriptor, &error, Duration::ZERO));
            }
        }
        drop(tx);

        let overall = self.deadline.map(|deadline| started + deadline);
        loop {
            let now = Instant::now();
            if overall.is_some_and(|deadline| now >= deadline) {
                for index in pending(&slots) {
                    let error = ReconcileError::unavailable(
                        descriptors[index].name(),
                        "abandoned at search deadline",
                    );
                    slots[index] = Some(SourceReport::failure(
                        &descriptors[index],
                        &error,
                        now - started,
                    ));
                }
                break;
            }
            for index in pending(&slots) {
                let descriptor = &descriptors[index];
                if now >= started + descriptor.timeout() {
                    let error = ReconcileError::SourceTimeout {
                        source_name: descriptor.name().to_string(),
                        timeout_ms: descriptor.timeout().as_millis() as u64,
                    };
                    slots[index] = Some(SourceReport::failure(descriptor, &error, now - started));
                }
            }

            let waiting = pending(&slots);
            let Some(next_wake) = waiting
                .iter()
                .map(|index| started + descriptors[*index].timeout())
                .chain(overall)
                .min()
            else {
                break;
            };

            match rx.recv_timeout(next_wake.saturating_duration_since(now)) {
                // Results for slots already timed out or abandoned are dropped here
                // and never reach the cache.
                Ok((index, result, elapsed)) => {
                    if slots[index].is_some() {
                        continue;
                    }
                    let descriptor = &descriptors[index];
                    if let (Some(cache), Ok(fetched)) = (&self.cache, &result) {
                        if !fetched.from_cache {
                            cache.insert(cache_key(descriptor.name(), query), fetched.raws.clone());
                        }
                    }
                    let raws = result.map(|fetched| fetched.raws);
                    slots[index] = Some(settle(descriptor, query, raws, elapsed));
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    for index in waiting {
                        let descriptor = &descriptors[index];
                        let error = ReconcileError::unavailable(
                            descriptor.name(),
                            "fetch aborted without a result",
                        );
                        let elapsed = now - started;
                        slots[index] = Some(SourceReport::failure(descriptor, &error, elapsed));
                    }
                    break;
                }
            }
        }

        let per_source = slots.into_iter().flatten().collect::<Vec<_>>();
        let outcome = SearchOutcome {
            query: query.to_string(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            per_source,
        };
        info!(
            query,
            succeeded = outcome.successful().count(),
            failed = outcome.failed().count(),
            elapsed_ms = outcome.elapsed_ms,
            "search finished"
        );
        outcome
    }

    /// Searches each query in turn, pausing `delay` between queries so that no
    /// source sees back-to-back requests. Sources within one query still run
    /// concurrently.
    pub fn search_many(&self, queries: &[String], delay: Duration) -> Vec<SearchOutcome> {
        let mut outcomes = Vec::with_capacity(queries.len());
        for (idx, query) in queries.iter().enumerate() {
            if idx > 0 && !delay.is_zero() {
                thread::sleep(delay);
            }
            outcomes.push(self.search(query));
        }
        outcomes
    }
}

fn pending(slots: &[Option<SourceReport>]) -> Vec<usize> {
    slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_none())
        .map(|(index, _)| index)
        .collect()
}

fn cache_key(source: &str, query: &str) -> String {
    format!("{source}|{}", query.trim().to_lowercase())
}

fn fetch_raw(
    descriptor: &SourceDescriptor,
    query: &str,
    cache: Option<&RawCache>,
) -> Result<Fetched, ReconcileError> {
    let key = cache_key(descriptor.name(), query);
    if let Some(raws) = cache.and_then(|cache| cache.get(&key)) {
        return Ok(Fetched {
            raws,
            from_cache: true,
        });
    }
    let raws = descriptor.fetch_records(query)?;
    Ok(Fetched {
        raws,
        from_cache: false,
    })
}

fn settle(
    descriptor: &SourceDescriptor,
    query: &str,
    result: Result<Vec<RawRecord>, ReconcileError>,
    elapsed: Duration,
) -> SourceReport {
    let raws = match result {
        Ok(raws) => raws,
        Err(error) => return SourceReport::failure(descriptor, &error, elapsed),
    };
    let records = raws
        .iter()
        .filter_map(|raw| normalize(raw, descriptor, Some(query)))
        .collect::<Vec<_>>();
    if records.is_empty() && !raws.is_empty() {
        let error = ReconcileError::malformed(
            descriptor.name(),
            format!("none of {} records carried an identity field", raws.len()),
        );
        return SourceReport::failure(descriptor, &error, elapsed);
    }
    debug!(
        source = descriptor.name(),
        records = records.len(),
        "source settled"
    );
    SourceReport::success(descriptor, records, elapsed)
}
