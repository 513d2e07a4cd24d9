mod cli;
mod drill;
mod shutdown;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use circ_core::SeedFile;
use circ_engine::{CirculationPolicy, start_engine};

use crate::cli::Cli;
use crate::drill::{Drill, DrillReport, engine_config, generated_seed, run_drill};
use crate::shutdown::{StopRequest, StopSignal, watch_ctrl_c};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &DrillReport) {
    let t = &report.tally;
    println!("Rounds: {}", report.rounds);
    println!("Duration: {:.2?}", report.elapsed);
    println!(
        "Borrows: {} ok, {} already borrowed",
        t.borrowed, t.borrow_conflicts
    );
    println!("Returns: {} ok", t.returned);
    println!(
        "Reservations: {} ok, {} rejected",
        t.reserved, t.reserve_conflicts
    );
    if t.unexpected > 0 {
        println!("Unexpected errors: {}", t.unexpected);
    }
    if let Some(left) = report.reservations_after_expiry {
        println!("Reservations left after expiry: {left}");
    }
    for round in &report.double_borrows {
        println!("Round {round}: more than one borrow succeeded");
    }
    for (round, books) in &report.violations {
        println!("Round {round}: invariant violated for books {books:?}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let seed = match &cli.seed {
        Some(path) => SeedFile::load(path)?,
        None => generated_seed(cli.books, cli.members),
    };
    let policy: CirculationPolicy = cli.policy.into();
    let engine = start_engine(engine_config(&seed, policy));

    println!(
        "circulation {} policy={:?} books={} members={} callers={} rounds={}",
        env!("CARGO_PKG_VERSION"),
        policy,
        seed.books.len(),
        seed.members.len(),
        cli.callers,
        cli.rounds
    );

    let stop = Arc::new(StopSignal::new());
    let mut stop_rx = watch_ctrl_c(stop.clone());
    let mut stop_open = true;

    let drill = Drill {
        callers: cli.callers as usize,
        rounds: cli.rounds,
        wait_expiry: cli.wait_expiry,
    };
    let mut task = {
        let engine = engine.clone();
        let stop = stop.clone();
        tokio::spawn(async move { run_drill(&engine, &drill, &stop).await })
    };

    let report = loop {
        tokio::select! {
            req = stop_rx.recv(), if stop_open => match req {
                Some(StopRequest::AfterRound) => {
                    tracing::warn!("Stop requested; finishing the current round (press CTRL+C again to exit immediately).");
                }
                Some(StopRequest::Now) => {
                    tracing::warn!("Stop requested again; exiting immediately.");
                    std::process::exit(130);
                }
                None => stop_open = false,
            },
            res = &mut task => {
                break res.map_err(|err| anyhow::anyhow!("drill task join error: {err}"))??;
            }
        }
    };

    print_report(&report);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&engine.snapshot().await)?);
    }

    if !report.is_clean() {
        anyhow::bail!(
            "drill detected {} double borrow(s), {} invariant violation(s), {} unexpected error(s)",
            report.double_borrows.len(),
            report.violations.len(),
            report.tally.unexpected
        );
    }
    Ok(())
}
