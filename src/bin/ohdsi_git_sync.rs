use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use ohdsi_git_sync::config::{Options, SyncArgs};
use ohdsi_git_sync::git::CommitOutcome;
use ohdsi_git_sync::sync::CohortSync;
use std::io::Write;

fn main() -> anyhow::Result<()> {
    let args = SyncArgs::parse();
    init_logging(args.verbose);

    let options = Options::load(args).context("invalid configuration")?;
    let result = CohortSync::new(options).run()?;

    match result.outcome {
        CommitOutcome::NoChanges => {
            log::info!("{} cohort(s) already up to date", result.cohorts)
        }
        CommitOutcome::Committed { sha, .. } => {
            log::info!("Left unpushed commit {sha} for inspection")
        }
        CommitOutcome::Pushed { sha, changes } => {
            log::info!("Pushed {sha} with {changes} change(s)")
        }
    }
    Ok(())
}

/// `RUST_LOG` overrides the level picked here.
fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {{{}}} {} - {}",
                buf.timestamp(),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .init();
}
