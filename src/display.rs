// =============================================================================
// display.rs - Terminal output
// =============================================================================
//
// Everything the user sees on the terminal:
//   - start banner with the active configuration
//   - status lines with colored level badges and local timestamps
//   - progress lines (one per 10% step, plus completion)
//   - scan alerts and the final summary
//
// This module knows nothing about parsing or detection. It receives finished
// values (AnalysisResult, ScanAlert, counts) and formats them. Diagnostics for
// developers go through `tracing` instead.
//
// `colored` turns colors off automatically when stdout is not a TTY, so
// redirected output stays free of ANSI escapes.
//
// =============================================================================

use chrono::Local;
use colored::*;
use fucarede::config::AppConfig;
use fucarede::{AnalysisResult, LoadedInput, ScanAlert};

const SEPARATOR_WIDTH: usize = 100;

/// Ports listed per alert before the list is cut.
const MAX_PORTS_SHOWN: usize = 25;

/// Longest rejected line echoed in debug mode.
const MAX_LINE_SHOWN: usize = 120;

// ---------------------------------------------------------------------------
// Banner
// ---------------------------------------------------------------------------

pub fn print_banner(config: &AppConfig, input: &LoadedInput) {
    let inner_width = SEPARATOR_WIDTH - 2;
    let border = "═".repeat(inner_width);
    let row = |text: String| format!("║{:<width$}║", text, width = inner_width);

    println!();
    println!("{}", format!("╔{}╗", border).bold().cyan());
    println!(
        "{}",
        format!(
            "║{:^width$}║",
            format!("FUCAREDE  ::  TRAFFIC LOG ANALYZER  v{}", env!("CARGO_PKG_VERSION")),
            width = inner_width
        )
        .bold()
        .cyan()
    );
    println!(
        "{}",
        format!("║{:^width$}║", "tcpdump Port Scan Detector", width = inner_width).cyan()
    );
    println!("{}", format!("╠{}╣", border).bold().cyan());

    let source = input
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<memory>".to_string());
    println!("{}", row(format!("  Input:  {}", source)).cyan());
    println!(
        "{}",
        row(format!(
            "  Size:   {} bytes        Lines: {}",
            group_thousands(input.size_bytes as usize),
            group_thousands(input.lines.len())
        ))
        .cyan()
    );
    println!(
        "{}",
        row(format!(
            "  Rule:   >{} distinct ports / {}s        Format: {}",
            config.analysis.port_threshold,
            config.analysis.time_window_secs,
            config.input.format
        ))
        .cyan()
    );
    println!(
        "{}",
        row(format!("  Report: {}", config.report.path.display())).cyan()
    );

    println!("{}", format!("╚{}╝", border).bold().cyan());
    println!();
}

pub fn print_separator() {
    println!("{}", "─".repeat(SEPARATOR_WIDTH).dimmed());
}

// ---------------------------------------------------------------------------
// Status lines
// ---------------------------------------------------------------------------

pub fn log_info(message: &str) {
    println!(
        "{} {} {}",
        timestamp().bold().white(),
        " INFO ".on_green().black().bold(),
        message.white()
    );
}

pub fn log_success(message: &str) {
    println!(
        "{} {} {}",
        timestamp().bold().white(),
        "  OK  ".on_green().black().bold(),
        message.green()
    );
}

pub fn log_warning(message: &str) {
    println!(
        "{} {} {}",
        timestamp().bold().white(),
        " WARN ".on_yellow().black().bold(),
        message.yellow()
    );
}

/// Errors go to stderr.
pub fn log_error(message: &str) {
    eprintln!(
        "{} {} {}",
        timestamp().bold().white(),
        " ERR  ".on_red().white().bold(),
        message.red()
    );
}

fn log_progress(message: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        " PROG ".on_blue().white().bold(),
        message.bright_blue()
    );
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Turns the `(done, total)` stream into at most one line per 10% step.
#[derive(Debug, Default)]
pub struct ProgressPrinter {
    last_step: usize,
}

impl ProgressPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, done: usize, total: usize) {
        if let Some(message) = self.message(done, total) {
            if done == total {
                log_success(&message);
            } else {
                log_progress(&message);
            }
        }
    }

    /// The line to print for this notification, if any.
    fn message(&mut self, done: usize, total: usize) -> Option<String> {
        if done >= total {
            return Some(format!("Parsing complete: {} lines", group_thousands(total)));
        }

        let step = done * 10 / total;
        if step <= self.last_step {
            return None;
        }
        self.last_step = step;
        Some(format!(
            "Processing... {:>3}% ({} / {} lines)",
            step * 10,
            group_thousands(done),
            group_thousands(total)
        ))
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

pub fn log_alert(alert: &ScanAlert) {
    let port_list = alert
        .unique_ports
        .iter()
        .take(MAX_PORTS_SHOWN)
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let suffix = if alert.unique_ports.len() > MAX_PORTS_SHOWN {
        format!(" ... (+{} more)", alert.unique_ports.len() - MAX_PORTS_SHOWN)
    } else {
        String::new()
    };

    println!("{}", "─".repeat(SEPARATOR_WIDTH).red());
    println!(
        "{} {} {} [PORT SCAN] {} | {} distinct ports within {:.3}s",
        timestamp().bold().white(),
        "▶▶▶".red().bold(),
        " ALERT ".on_red().white().bold(),
        format!("[IP: {}]", alert.source_address).red().bold(),
        alert.unique_ports.len().to_string().red().bold(),
        alert.window_end - alert.window_start
    );
    println!(
        "  Window: {:.6} -> {:.6}   Events from source: {}",
        alert.window_start,
        alert.window_end,
        group_thousands(alert.total_events)
    );
    println!("  Ports:  {}{}", port_list, suffix);
    println!("{}", "─".repeat(SEPARATOR_WIDTH).red());
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Prints the statistics, the top-N table and the flagged sources.
pub fn print_summary(result: &AnalysisResult, top_n: usize) {
    println!();
    println!("{}", "ANALYSIS SUMMARY".bold().cyan());
    print_separator();

    let stats = [
        ("Lines processed", result.lines_processed),
        ("Valid events", result.valid_events),
        ("Unique sources", result.unique_sources),
        ("Port scans detected", result.port_scans_detected),
    ];
    for (label, value) in stats {
        println!("  {:<22}{}", label, group_thousands(value).bold());
    }

    println!();
    println!("{}", format!("TOP {} SOURCES BY EVENT COUNT", top_n).bold().cyan());
    print_separator();
    let ranking = top_rows(result, top_n);
    if ranking.is_empty() {
        println!("  {}", "(no valid events)".dimmed());
    }
    for (rank, (source, count)) in ranking.iter().enumerate() {
        let marker = if result.is_flagged(source) {
            " PORT SCAN ".on_red().white().bold()
        } else {
            "".normal()
        };
        println!(
            "  {:>3}. {:<18} {:>12}  {}",
            rank + 1,
            source,
            group_thousands(*count),
            marker
        );
    }

    println!();
    println!("{}", "FLAGGED SOURCES".bold().cyan());
    print_separator();
    if result.flagged_sources.is_empty() {
        println!("  {}", "No port scan detected.".green());
    }
    for source in &result.flagged_sources {
        let count = result.event_counts.get(source).unwrap_or(0);
        println!(
            "  {} {:<18} {} events",
            "▶".red().bold(),
            source.red().bold(),
            group_thousands(count)
        );
    }
    println!();
}

/// The first `top_n` ranking rows. The precomputed top list covers the usual
/// case; the full ranking is only rebuilt when more rows are asked for.
fn top_rows(result: &AnalysisResult, top_n: usize) -> Vec<(String, usize)> {
    let covered = result.top_sources.len() >= top_n
        || result.top_sources.len() == result.unique_sources;
    if covered {
        result.top_sources.iter().take(top_n).cloned().collect()
    } else {
        result.event_counts.ranked().into_iter().take(top_n).collect()
    }
}

// ---------------------------------------------------------------------------
// Debug diagnostics
// ---------------------------------------------------------------------------

pub fn log_debug_parse_fail(line_number: usize, line: &str, parser_name: &str, expected: &str) {
    println!(
        "{} {} line {} rejected (parser: {})",
        timestamp().bold().white(),
        " FAIL ".on_red().white().bold(),
        line_number,
        parser_name.red().bold()
    );
    let shown: String = if line.chars().count() > MAX_LINE_SHOWN {
        format!("{}...", line.chars().take(MAX_LINE_SHOWN).collect::<String>())
    } else {
        line.to_string()
    };
    println!("                      Got:      \"{}\"", shown.yellow());
    println!("                      Expected: \"{}\"", expected.dimmed());
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn timestamp() -> String {
    Local::now().format("[%Y-%m-%d %H:%M:%S]").to_string()
}

/// `1234567` -> `"1,234,567"`.
pub fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
