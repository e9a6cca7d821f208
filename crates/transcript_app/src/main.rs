//! Replays a scripted browsing session against the transcript engine and
//! prints every transcript response as a JSON line.
mod config;
mod runner;
mod scenario;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use engine_logging::LogDestination;
use log::LevelFilter;
use tokio::task::LocalSet;
use transcript_engine::EngineSettings;

const LOG_FILE: &str = "./engine.log";

/// Replays a scripted browsing session against the transcript engine.
#[derive(Parser, Debug, PartialEq, Eq)]
#[command(name = "transcript_app")]
#[command(version)]
struct AppArgs {
    /// Scenario file (RON).
    scenario: PathBuf,

    /// Settings overrides file (RON).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Also write log output to the terminal.
    #[arg(long)]
    log_terminal: bool,
}

impl AppArgs {
    fn log_destination(&self) -> LogDestination {
        if self.log_terminal {
            LogDestination::Both(PathBuf::from(LOG_FILE))
        } else {
            LogDestination::File(PathBuf::from(LOG_FILE))
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = AppArgs::parse();
    engine_logging::initialize(args.log_destination(), LevelFilter::Info);

    let scenario = scenario::load(&args.scenario)?;
    let mut settings = EngineSettings::default();
    if let Some(path) = &args.settings {
        settings = config::load_overrides(path).apply(settings);
    }
    let settings = scenario.settings.apply(settings);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("building the runtime")?;
    let responses = LocalSet::new().block_on(&runtime, runner::run(&scenario, settings))?;

    for response in &responses {
        println!("{}", serde_json::to_string(response)?);
    }
    Ok(())
}
