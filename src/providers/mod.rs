pub mod bref;
pub mod custom;
pub mod federation;
pub mod nba_live;
pub mod nba_stats;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::{DEFAULT_HTML_TIMEOUT_MS, DEFAULT_TIMEOUT_MS, ResolvedConfig};
use crate::domain::SourceKind;
use crate::error::ReconcileError;
use crate::http::HttpClient;
use crate::normalize::SchemaHint;
use crate::source::{Source, SourceDescriptor, SourceRegistry};

use self::bref::BasketballReferenceSource;
use self::custom::CustomJsonSource;
use self::federation::{ATHLETE_SITES, AthleteSiteSource};
use self::nba_live::{LiveFeed, NbaLiveSource};
use self::nba_stats::NbaStatsSource;

type Builder<'a> = Box<dyn Fn(Duration) -> Arc<dyn Source> + 'a>;

/// Standings sources in priority order. The custom source is appended only when
/// a URL is given.
pub fn standings_registry(
    http: Arc<dyn HttpClient>,
    config: &ResolvedConfig,
    custom_url: Option<&str>,
) -> Result<SourceRegistry, ReconcileError> {
    let mut plan: Vec<(&str, SourceKind, f64, u64, Builder<'_>)> = vec![
        (
            nba_stats::NAME,
            SourceKind::OfficialApi,
            0.95,
            DEFAULT_TIMEOUT_MS,
            Box::new(|timeout: Duration| -> Arc<dyn Source> {
                Arc::new(NbaStatsSource::new(http.clone(), timeout))
            }),
        ),
        (
            LiveFeed::CdnLive.name(),
            SourceKind::OfficialApi,
            0.9,
            DEFAULT_TIMEOUT_MS,
            Box::new(|timeout: Duration| -> Arc<dyn Source> {
                Arc::new(NbaLiveSource::new(LiveFeed::CdnLive, http.clone(), timeout))
            }),
        ),
        (
            LiveFeed::DataNba.name(),
            SourceKind::OfficialApi,
            0.85,
            DEFAULT_TIMEOUT_MS,
            Box::new(|timeout: Duration| -> Arc<dyn Source> {
                Arc::new(NbaLiveSource::new(LiveFeed::DataNba, http.clone(), timeout))
            }),
        ),
        (
            bref::NAME,
            SourceKind::HtmlScrape,
            0.8,
            DEFAULT_HTML_TIMEOUT_MS,
            Box::new(|timeout: Duration| -> Arc<dyn Source> {
                Arc::new(BasketballReferenceSource::new(http.clone(), timeout))
            }),
        ),
    ];
    if let Some(url) = custom_url {
        let custom_http = http.clone();
        plan.push((
            custom::NAME,
            SourceKind::Specialized,
            0.7,
            DEFAULT_TIMEOUT_MS,
            Box::new(move |timeout: Duration| -> Arc<dyn Source> {
                Arc::new(CustomJsonSource::new(url, custom_http.clone(), timeout))
            }),
        ));
    }

    let mut descriptors = Vec::with_capacity(plan.len());
    for (name, kind, reliability, timeout_ms, build) in plan {
        descriptors.extend(descriptor(
            config,
            name,
            kind,
            reliability,
            timeout_ms,
            SchemaHint::Standings,
            &*build,
        )?);
    }
    Ok(SourceRegistry::new(descriptors))
}

pub fn athlete_registry(
    http: Arc<dyn HttpClient>,
    config: &ResolvedConfig,
) -> Result<SourceRegistry, ReconcileError> {
    let mut descriptors = Vec::new();
    for profile in ATHLETE_SITES {
        let build = |timeout: Duration| -> Arc<dyn Source> {
            Arc::new(AthleteSiteSource::new(profile.clone(), http.clone(), timeout))
        };
        descriptors.extend(descriptor(
            config,
            profile.name,
            profile.kind,
            profile.reliability,
            DEFAULT_TIMEOUT_MS,
            SchemaHint::Athlete,
            &build,
        )?);
    }
    Ok(SourceRegistry::new(descriptors))
}

fn descriptor(
    config: &ResolvedConfig,
    name: &str,
    kind: SourceKind,
    reliability: f64,
    timeout_ms: u64,
    schema: SchemaHint,
    build: &dyn Fn(Duration) -> Arc<dyn Source>,
) -> Result<Option<SourceDescriptor>, ReconcileError> {
    if !config.is_enabled(name) {
        debug!(source = name, "source disabled by config");
        return Ok(None);
    }
    let entry = config.source_override(name);
    let reliability = entry.and_then(|entry| entry.reliability).unwrap_or(reliability);
    let timeout = entry
        .and_then(|entry| entry.timeout)
        .unwrap_or(Duration::from_millis(timeout_ms));
    SourceDescriptor::new(name, kind, reliability, timeout, schema, build(timeout)).map(Some)
}
