// =============================================================================
// cli.rs - Command line arguments
// =============================================================================
//
// Flags override the matching config.toml values. Anything not given on the
// command line comes from the config file (or its defaults).
//
// =============================================================================

use clap::Parser;
use fucarede::config::AppConfig;
use std::path::PathBuf;

/// Offline port scan detector for tcpdump text captures.
///
/// Reads a capture produced by `tcpdump -tt -n`, flags every source address
/// that touches more than THRESHOLD distinct destination ports inside a
/// sliding window of SECS seconds, and writes a CSV report.
#[derive(Parser, Debug, Clone)]
#[command(name = "fucarede", version, about, long_about = None)]
pub struct Cli {
    /// Traffic capture to analyze (one packet per line).
    #[arg(value_name = "TRAFFIC_FILE")]
    pub traffic_file: PathBuf,

    /// Configuration file. A missing file means built-in defaults.
    #[arg(short = 'c', long = "config", value_name = "PATH", default_value = "config.toml")]
    pub config: PathBuf,

    // ── Detection ────────────────────────────────────────────────────────────
    /// Sliding window width in seconds (1-3600).
    #[arg(short = 'w', long = "window", value_name = "SECS")]
    pub window: Option<u64>,

    /// Distinct ports allowed inside one window before a source is flagged (1-1000).
    #[arg(short = 't', long = "threshold", value_name = "N")]
    pub threshold: Option<usize>,

    // ── Output ───────────────────────────────────────────────────────────────
    /// CSV report destination.
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Print every line that failed to parse.
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Copies the flags that were actually given onto `config`.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(window) = self.window {
            config.analysis.time_window_secs = window;
        }
        if let Some(threshold) = self.threshold {
            config.analysis.port_threshold = threshold;
        }
        if let Some(output) = &self.output {
            config.report.path = output.clone();
        }
        if self.debug {
            config.display.debug = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_only_given_flags() {
        let cli = Cli::parse_from(["fucarede", "capture.txt", "--threshold", "3"]);
        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(cli.traffic_file, PathBuf::from("capture.txt"));
        assert_eq!(config.analysis.port_threshold, 3);
        assert_eq!(config.analysis.time_window_secs, 60);
        assert_eq!(config.report.path, PathBuf::from("relatorio.csv"));
        assert!(!config.display.debug);
    }

    #[test]
    fn test_all_overrides() {
        let cli = Cli::parse_from([
            "fucarede", "cap.txt", "-w", "5", "-t", "2", "-o", "out.csv", "--debug",
        ]);
        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.analysis.time_window_secs, 5);
        assert_eq!(config.analysis.port_threshold, 2);
        assert_eq!(config.report.path, PathBuf::from("out.csv"));
        assert!(config.display.debug);
    }

    #[test]
    fn test_traffic_file_is_required() {
        assert!(Cli::try_parse_from(["fucarede"]).is_err());
    }
}
