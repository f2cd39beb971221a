// =============================================================================
// config.rs - Configuration
// =============================================================================
//
// `config.toml` is deserialized with serde + toml into `AppConfig`.
//
// DEFAULTS:
//   Every section and every key carries `#[serde(default)]`, so an empty file,
//   a partial file, or no file at all yields a usable configuration:
//
//     [analysis]  time_window_secs = 60, port_threshold = 10
//     [input]     format = "tcpdump"
//     [report]    path = "relatorio.csv"
//     [display]   debug = false, top_n = 10
//
// VALIDATION AFTER DESERIALIZATION:
//   serde only checks types. `validate()` checks the values (ranges, known
//   parser names, non-empty paths) and collects EVERY problem into one error,
//   so a user fixes the whole file in one go. Command-line overrides are
//   applied before validation, so they go through the same checks.
//
// =============================================================================

use crate::analysis::AnalysisParams;
use crate::report::DEFAULT_REPORT_FILENAME;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

pub const WINDOW_RANGE: RangeInclusive<u64> = 1..=3600;
pub const THRESHOLD_RANGE: RangeInclusive<usize> = 1..=1000;
pub const TOP_N_RANGE: RangeInclusive<usize> = 1..=1000;

const KNOWN_FORMATS: &[&str] = &["tcpdump"];

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub input: InputConfig,
    pub report: ReportConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sliding window width in seconds.
    pub time_window_secs: u64,
    /// Distinct destination ports a source may hit inside one window before
    /// it is flagged.
    pub port_threshold: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            time_window_secs: 60,
            port_threshold: 10,
        }
    }
}

impl AnalysisConfig {
    pub fn params(&self) -> AnalysisParams {
        AnalysisParams {
            time_window_secs: self.time_window_secs,
            port_threshold: self.port_threshold,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Line format of the traffic file ("tcpdump").
    pub format: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            format: "tcpdump".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_REPORT_FILENAME),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Prints every rejected line with the expected format.
    pub debug: bool,
    /// Rows in the printed top-sources table.
    pub top_n: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            debug: false,
            top_n: 10,
        }
    }
}

impl AppConfig {
    /// Reads and parses an explicit config file. Values are not validated
    /// here; call `validate()` once overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Invalid TOML in {}", path.display()))
    }

    /// Like `load`, but a missing file means "all defaults".
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Checks the semantic constraints and reports all violations together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // --- Analysis ---

        if !WINDOW_RANGE.contains(&self.analysis.time_window_secs) {
            errors.push(format!(
                "analysis.time_window_secs = {}: must be between {} and {} seconds",
                self.analysis.time_window_secs,
                WINDOW_RANGE.start(),
                WINDOW_RANGE.end()
            ));
        }
        if !THRESHOLD_RANGE.contains(&self.analysis.port_threshold) {
            errors.push(format!(
                "analysis.port_threshold = {}: must be between {} and {} ports",
                self.analysis.port_threshold,
                THRESHOLD_RANGE.start(),
                THRESHOLD_RANGE.end()
            ));
        }

        // --- Input ---

        if !KNOWN_FORMATS.contains(&self.input.format.as_str()) {
            errors.push(format!(
                "input.format = {:?} is invalid. Accepted values: {}",
                self.input.format,
                KNOWN_FORMATS
                    .iter()
                    .map(|f| format!("{:?}", f))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        // --- Report ---

        if self.report.path.as_os_str().is_empty() {
            errors.push("report.path cannot be empty".to_string());
        }

        // --- Display ---

        if !TOP_N_RANGE.contains(&self.display.top_n) {
            errors.push(format!(
                "display.top_n = {}: must be between {} and {}",
                self.display.top_n,
                TOP_N_RANGE.start(),
                TOP_N_RANGE.end()
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            let listing = errors
                .iter()
                .enumerate()
                .map(|(i, e)| format!("  {}. {}", i + 1, e))
                .collect::<Vec<_>>()
                .join("\n");
            anyhow::bail!(
                "configuration has {} error(s):\n{}",
                errors.len(),
                listing
            );
        }
    }
}
