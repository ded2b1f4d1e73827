use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use chrono::Datelike;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use prospect_reconciler::app::{App, SearchOptions, StandingsOptions};
use prospect_reconciler::config::{ConfigLoader, custom_source_url};
use prospect_reconciler::domain::Season;
use prospect_reconciler::error::ReconcileError;
use prospect_reconciler::http::{HttpClient, ReqwestClient};
use prospect_reconciler::output::JsonOutput;
use prospect_reconciler::providers::{athlete_registry, standings_registry};

#[derive(Parser)]
#[command(name = "prospect-rc")]
#[command(about = "Reconciles basketball prospect and NBA standings data from unreliable sources")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch current standings and update the lottery/playoff file")]
    Standings(StandingsArgs),
    #[command(about = "Search athletes across sources and consolidate the matches")]
    Search(SearchArgs),
}

#[derive(Args)]
struct StandingsArgs {
    /// Season as YYYY-YY; rebuilt from --seasonStart when malformed
    #[arg(long)]
    season: Option<String>,

    #[arg(long = "seasonStart", value_parser = clap::value_parser!(i32).range(1900..=9998))]
    season_start: Option<i32>,

    #[arg(long)]
    out: Option<Utf8PathBuf>,

    /// Custom JSON standings URL, tried after the built-in sources
    #[arg(long)]
    source: Option<String>,

    #[arg(long)]
    force: bool,

    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct SearchArgs {
    #[arg(required = true)]
    names: Vec<String>,

    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long)]
    deadline_ms: Option<u64>,

    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<ReconcileError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ReconcileError) -> u8 {
    match error {
        ReconcileError::TotalAcquisitionFailure => 2,
        ReconcileError::ConfigRead(_)
        | ReconcileError::ConfigParse(_)
        | ReconcileError::ConfigInvalid(_)
        | ReconcileError::InvalidSeason(_) => 2,
        ReconcileError::Http(_) | ReconcileError::HttpStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Standings(args) => run_standings(args),
        Commands::Search(args) => run_search(args),
    }
}

fn run_standings(args: StandingsArgs) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let start_year = args
        .season_start
        .unwrap_or_else(|| chrono::Utc::now().year());
    let season = Season::normalize(args.season.as_deref(), start_year);
    let custom_url = custom_source_url(args.source.as_deref());

    let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new()?);
    let registry = standings_registry(http, &config, custom_url.as_deref())?;
    let app = App::new(config);
    let outcome = app.update_standings(
        registry,
        &StandingsOptions {
            season,
            output: args.out,
            force: args.force,
        },
    )?;
    JsonOutput::print_standings(&outcome).into_diagnostic()?;
    Ok(())
}

fn run_search(args: SearchArgs) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    if let Some(threshold) = args.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ReconcileError::ConfigInvalid(format!(
                "--threshold must be in [0, 1], got {threshold}"
            ))
            .into());
        }
    }

    let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new()?);
    let registry = athlete_registry(http, &config)?;
    let app = App::new(config);
    let result = app.search(
        registry,
        &args.names,
        &SearchOptions {
            threshold: args.threshold,
            deadline: args.deadline_ms.map(Duration::from_millis),
        },
    );
    JsonOutput::print_search(&result).into_diagnostic()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn season_start_is_range_checked() {
        let parsed = Cli::try_parse_from(["prospect-rc", "standings", "--seasonStart", "2025"]);
        assert!(parsed.is_ok());
        let overflow =
            Cli::try_parse_from(["prospect-rc", "standings", "--seasonStart", "2147483647"]);
        assert!(overflow.is_err());
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(map_exit_code(&ReconcileError::TotalAcquisitionFailure), 2);
        assert_eq!(map_exit_code(&ReconcileError::Http("reset".to_string())), 3);
        assert_eq!(map_exit_code(&ReconcileError::Filesystem("denied".to_string())), 1);
    }
}
