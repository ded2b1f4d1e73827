use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::consolidate::{ConsolidatedEntity, consolidate};
use crate::domain::{Season, SourceKind};
use crate::error::ReconcileError;
use crate::fallback::FallbackFetcher;
use crate::matcher::MatchPolicy;
use crate::search::{ParallelSearcher, RawCache, SearchOutcome, SourceStatus};
use crate::source::SourceRegistry;
use crate::standings::{StandingsRequest, UpdateOutcome, update_standings};

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub threshold: Option<f64>,
    pub deadline: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct StandingsOptions {
    pub season: Season,
    pub output: Option<Utf8PathBuf>,
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub results: Vec<QueryResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub successful_sources: usize,
    pub failed_sources: usize,
    pub elapsed_ms: u64,
    pub sources: Vec<SourceSummary>,
    pub entities: Vec<ConsolidatedEntity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub kind: SourceKind,
    pub reliability: f64,
    pub status: SourceStatus,
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl QueryResult {
    fn from_outcome(outcome: &SearchOutcome, policy: &MatchPolicy) -> Self {
        let entities = consolidate(&outcome.records(), policy);
        let sources = outcome
            .per_source
            .iter()
            .map(|report| SourceSummary {
                name: report.source.clone(),
                kind: report.kind,
                reliability: report.reliability,
                status: report.status,
                records: report.records.len(),
                error: report.error.clone(),
                elapsed_ms: report.elapsed_ms,
            })
            .collect();
        Self {
            query: outcome.query.clone(),
            successful_sources: outcome.successful().count(),
            failed_sources: outcome.failed().count(),
            elapsed_ms: outcome.elapsed_ms,
            sources,
            entities,
        }
    }
}

/// Ties the two use cases to one resolved config and a shared search cache.
#[derive(Clone)]
pub struct App {
    config: ResolvedConfig,
    cache: Arc<RawCache>,
}

impl App {
    pub fn new(config: ResolvedConfig) -> Self {
        let cache = Arc::new(RawCache::new(config.cache_ttl, config.cache_entries));
        Self { config, cache }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Searches every athlete source for each name, consolidating per name.
    /// Names are searched one after another with the configured polite delay.
    pub fn search(
        &self,
        registry: SourceRegistry,
        names: &[String],
        options: &SearchOptions,
    ) -> SearchResult {
        let policy = MatchPolicy::new(options.threshold.unwrap_or(self.config.match_threshold));
        let mut searcher = ParallelSearcher::new(registry).with_cache(self.cache.clone());
        if let Some(deadline) = options.deadline.or(self.config.search_deadline) {
            searcher = searcher.with_deadline(deadline);
        }

        let results = searcher
            .search_many(names, self.config.polite_delay)
            .iter()
            .map(|outcome| QueryResult::from_outcome(outcome, &policy))
            .collect();
        SearchResult { results }
    }

    pub fn update_standings(
        &self,
        registry: SourceRegistry,
        options: &StandingsOptions,
    ) -> Result<UpdateOutcome, ReconcileError> {
        let fetcher = FallbackFetcher::new(registry).with_min_rows(self.config.min_rows);
        let request = StandingsRequest {
            season: options.season.clone(),
            output: options
                .output
                .clone()
                .unwrap_or_else(|| self.config.output.clone()),
            force: options.force,
            policy: self.config.groups,
        };
        update_standings(&fetcher, &request)
    }
}
