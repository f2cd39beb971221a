// =============================================================================
// main.rs - FucaRede entry point
// =============================================================================
//
// FLOW:
//   1. Init tracing (RUST_LOG, default "fucarede=warn")
//   2. Parse CLI flags, load config.toml (or defaults), apply flag overrides,
//      validate everything at once
//   3. Build the parser and the session, load the traffic file
//   4. Run the analysis on a blocking worker; the main task prints progress
//      and watches Ctrl+C
//   5. Print alerts and the summary, write the CSV report
//
// WORKER + CHANNEL:
//   The session is moved into `spawn_blocking` and handed back when the run
//   ends. Progress travels over an unbounded mpsc channel: the worker's
//   progress sink only calls `send`, which never blocks. The worker drops the
//   sender when it returns, so the receiver drains and then yields `None`.
//
// CTRL+C:
//   Sets the shared CancelFlag. The worker notices it at its next checkpoint
//   and returns AnalysisError::Cancelled; no report is written.
//
// =============================================================================

mod cli;
mod display;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use fucarede::config::AppConfig;
use fucarede::{create_parser, AnalysisError, AnalysisSession, Analyzer, CancelFlag};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Rejected lines echoed in debug mode before the rest is summarized.
const MAX_DEBUG_FAILURES: usize = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fucarede=warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // --- Configuration ---
    let mut config = AppConfig::load_or_default(&cli.config)?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    let params = config.analysis.params();

    // --- Input ---
    let parser = create_parser(&config.input.format)?;
    let mut session = AnalysisSession::new(Analyzer::new(parser));
    let input = session
        .load_file(&cli.traffic_file)
        .with_context(|| format!("Cannot load {}", cli.traffic_file.display()))?;

    display::print_banner(&config, input);
    if config.display.debug {
        display::log_warning("DEBUG mode on - every rejected line will be shown");
    }
    if input.lines.is_empty() {
        display::log_warning("Traffic file has no non-blank lines, nothing to analyze");
        return Ok(());
    }
    display::log_info(&format!("Parser: {}", session.parser().name()));
    display::log_info("Analyzing... (Ctrl+C to cancel)");
    display::print_separator();

    // --- Analysis on a blocking worker ---
    let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, usize)>();

    let worker_cancel = Arc::clone(&cancel);
    let mut worker = tokio::task::spawn_blocking(move || {
        let mut progress = |done: usize, total: usize| {
            // A closed receiver only means nobody is watching anymore.
            let _ = tx.send((done, total));
        };
        let outcome = session
            .run(params, &mut progress, Some(worker_cancel.as_ref()))
            .map(|_| ());
        (session, outcome)
    });

    let mut printer = display::ProgressPrinter::new();
    let mut cancel_requested = false;

    let (session, outcome) = loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                println!();
                display::log_warning("Cancelling analysis...");
                cancel.store(true, Ordering::Relaxed);
                cancel_requested = true;
            }

            Some((done, total)) = rx.recv() => {
                printer.update(done, total);
            }

            joined = &mut worker => {
                break joined.context("Analysis worker terminated abnormally")?;
            }
        }
    };

    match outcome {
        Ok(()) => {}
        Err(AnalysisError::Cancelled) => {
            display::log_warning("Analysis cancelled, no report written");
            return Ok(());
        }
        Err(err) => {
            display::log_error(&format!("Analysis failed: {}", err));
            return Err(err.into());
        }
    }

    let Some(result) = session.current() else {
        anyhow::bail!("analysis finished without a result");
    };

    // --- Output ---
    if config.display.debug {
        print_rejected_lines(&session);
    }

    for alert in &result.scan_alerts {
        display::log_alert(alert);
    }
    display::print_summary(result, config.display.top_n);

    match session.write_report(&config.report.path) {
        Ok(()) => display::log_success(&format!(
            "Report written to {}",
            config.report.path.display()
        )),
        Err(err) => {
            display::log_error(&format!("Report not written: {}", err));
            return Err(err.into());
        }
    }

    Ok(())
}

/// Echoes the loaded lines the parser rejected (debug mode).
fn print_rejected_lines(session: &AnalysisSession) {
    let Some(input) = session.input() else {
        return;
    };
    let parser = session.parser();

    let mut rejected = input
        .lines
        .iter()
        .enumerate()
        .filter(|(_, line)| parser.parse(line).is_none());

    for (index, line) in rejected.by_ref().take(MAX_DEBUG_FAILURES) {
        display::log_debug_parse_fail(index + 1, line, parser.name(), parser.expected_format());
    }
    let remaining = rejected.count();
    if remaining > 0 {
        display::log_warning(&format!("{} more rejected lines not shown", remaining));
    }
}
