use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::domain::{RawRecord, SourceKind};
use crate::error::ReconcileError;
use crate::normalize::SchemaHint;

/// A single external data provider.
///
/// `Ok(None)` is the expected answer for a recoverable failure (nothing found,
/// unexpected shape). Returned errors and panics are caught by the caller and
/// recorded as a failed source.
pub trait Source: Send + Sync {
    fn fetch(&self, query: &str) -> Result<Option<Vec<RawRecord>>, ReconcileError>;
}

impl<F> Source for F
where
    F: Fn(&str) -> Result<Option<Vec<RawRecord>>, ReconcileError> + Send + Sync,
{
    fn fetch(&self, query: &str) -> Result<Option<Vec<RawRecord>>, ReconcileError> {
        self(query)
    }
}

/// Wraps a closure as a shared source.
pub fn source_fn<F>(fetch: F) -> Arc<dyn Source>
where
    F: Fn(&str) -> Result<Option<Vec<RawRecord>>, ReconcileError> + Send + Sync + 'static,
{
    Arc::new(fetch)
}

#[derive(Clone)]
pub struct SourceDescriptor {
    name: String,
    kind: SourceKind,
    reliability: f64,
    timeout: Duration,
    schema: SchemaHint,
    source: Arc<dyn Source>,
}

impl SourceDescriptor {
    pub fn new(
        name: impl Into<String>,
        kind: SourceKind,
        reliability: f64,
        timeout: Duration,
        schema: SchemaHint,
        source: Arc<dyn Source>,
    ) -> Result<Self, ReconcileError> {
        let name = name.into();
        if !(reliability > 0.0 && reliability <= 1.0) {
            return Err(ReconcileError::ConfigInvalid(format!(
                "reliability for {name} must be in (0, 1], got {reliability}"
            )));
        }
        Ok(Self {
            name,
            kind,
            reliability,
            timeout,
            schema,
            source,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn reliability(&self) -> f64 {
        self.reliability
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn schema(&self) -> SchemaHint {
        self.schema
    }

    /// Copy of this descriptor with different policy values; the fetcher is shared.
    pub fn with_policy(&self, reliability: f64, timeout: Duration) -> Result<Self, ReconcileError> {
        Self::new(
            self.name.clone(),
            self.kind,
            reliability,
            timeout,
            self.schema,
            self.source.clone(),
        )
    }

    /// Calls the source on the current thread. `None` and an empty answer both
    /// become `SourceUnavailable`.
    pub fn fetch_records(&self, query: &str) -> Result<Vec<RawRecord>, ReconcileError> {
        match self.source.fetch(query)? {
            Some(records) if !records.is_empty() => Ok(records),
            Some(_) => Err(ReconcileError::unavailable(&self.name, "no rows returned")),
            None => Err(ReconcileError::unavailable(&self.name, "no data returned")),
        }
    }

    /// Runs the fetch on a worker thread and waits at most `timeout`. A fetch that
    /// overruns is abandoned; its eventual result is dropped.
    pub fn fetch_with_timeout(&self, query: &str) -> Result<Vec<RawRecord>, ReconcileError> {
        let (tx, rx) = mpsc::channel();
        let descriptor = self.clone();
        let query = query.to_string();
        thread::Builder::new()
            .name(format!("source-{}", self.name))
            .spawn(move || {
                let _ = tx.send(descriptor.fetch_records(&query));
            })
            .map_err(|err| ReconcileError::unavailable(&self.name, err.to_string()))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ReconcileError::SourceTimeout {
                source_name: self.name.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ReconcileError::unavailable(
                &self.name,
                "fetch aborted without a result",
            )),
        }
    }
}

impl fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("reliability", &self.reliability)
            .field("timeout", &self.timeout)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Ordered list of sources. Order is the fallback priority for singleton
/// datasets and has no meaning for parallel search.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    descriptors: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    pub fn new(descriptors: Vec<SourceDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SourceDescriptor> {
        self.descriptors.iter().find(|desc| desc.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.descriptors.iter().map(|desc| desc.name.clone()).collect()
    }
}

impl FromIterator<SourceDescriptor> for SourceRegistry {
    fn from_iter<T: IntoIterator<Item = SourceDescriptor>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
