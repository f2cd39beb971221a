// =============================================================================
// session.rs - Analysis Session
// =============================================================================
//
// Holds everything one user works with between runs:
//   - the loaded input (lines, source path, file size)
//   - the current analysis result (at most one; a new run replaces it)
//
// There is no global state. The binary owns one session; tests build their
// own. A session is a plain value: move it into a worker for a run and take it
// back afterwards, or keep it on one thread.
//
// BLANK LINES:
//   Loading drops lines that are empty after trimming. They never reach the
//   analysis and never count as processed. Lines handed to `analysis::analyze`
//   directly are not filtered.
//
// =============================================================================

use crate::analysis::{AnalysisError, AnalysisParams, AnalysisResult, Analyzer};
use crate::parser::LineParser;
use crate::report::{self, ReportError};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

/// Input lines plus where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedInput {
    /// `None` when the lines were handed over from memory.
    pub path: Option<PathBuf>,
    pub size_bytes: u64,
    pub lines: Vec<String>,
}

impl LoadedInput {
    fn from_text(path: Option<PathBuf>, size_bytes: u64, text: &str) -> Self {
        let lines = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        Self {
            path,
            size_bytes,
            lines,
        }
    }
}

pub struct AnalysisSession {
    analyzer: Analyzer,
    input: Option<LoadedInput>,
    current: Option<AnalysisResult>,
}

impl AnalysisSession {
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            analyzer,
            input: None,
            current: None,
        }
    }

    /// Reads a UTF-8 text file and makes its non-blank lines the input.
    /// Any previous result is discarded.
    pub fn load_file(&mut self, path: &Path) -> Result<&LoadedInput, AnalysisError> {
        let io_error = |source: std::io::Error| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        };
        let text = std::fs::read_to_string(path).map_err(io_error)?;
        let size_bytes = text.len() as u64;

        let input = LoadedInput::from_text(Some(path.to_path_buf()), size_bytes, &text);
        tracing::info!(
            path = %path.display(),
            bytes = size_bytes,
            lines = input.lines.len(),
            "traffic file loaded"
        );

        self.current = None;
        Ok(self.input.insert(input))
    }

    /// Same as `load_file`, from lines already in memory.
    pub fn load_lines<I, S>(&mut self, lines: I) -> &LoadedInput
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines
            .into_iter()
            .map(Into::into)
            .filter(|line| !line.trim().is_empty())
            .collect();
        let size_bytes = lines.iter().map(|line| line.len() as u64 + 1).sum();

        self.current = None;
        self.input.insert(LoadedInput {
            path: None,
            size_bytes,
            lines,
        })
    }

    /// Parser used by this session's runs.
    pub fn parser(&self) -> &dyn LineParser {
        self.analyzer.parser()
    }

    pub fn input(&self) -> Option<&LoadedInput> {
        self.input.as_ref()
    }

    /// Analyzes the loaded lines and stores the outcome as the current
    /// result. On error the previous result (if any) is left in place.
    pub fn run(
        &mut self,
        params: AnalysisParams,
        progress: &mut dyn FnMut(usize, usize),
        cancel: Option<&AtomicBool>,
    ) -> Result<&AnalysisResult, AnalysisError> {
        let lines = match &self.input {
            Some(input) if !input.lines.is_empty() => &input.lines,
            _ => return Err(AnalysisError::NoData),
        };

        let analyzer = &self.analyzer;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            analyzer.analyze(lines, params, progress, cancel)
        }));

        let result = match outcome {
            Ok(result) => result?,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(%message, "analysis panicked");
                return Err(AnalysisError::Internal(message));
            }
        };

        Ok(self.current.insert(result))
    }

    pub fn current(&self) -> Option<&AnalysisResult> {
        self.current.as_ref()
    }

    /// Clears the current result. With `keep_file == false` the loaded input
    /// goes too.
    pub fn reset(&mut self, keep_file: bool) {
        self.current = None;
        if !keep_file {
            self.input = None;
        }
    }

    /// Writes the CSV report of the current result.
    pub fn write_report(&self, path: &Path) -> Result<(), ReportError> {
        let result = self.current.as_ref().ok_or(ReportError::NoResult)?;
        report::write_report(result, path)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{LineParser, TrafficEvent};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn test_params() -> AnalysisParams {
        AnalysisParams {
            time_window_secs: 5,
            port_threshold: 2,
        }
    }

    fn session() -> AnalysisSession {
        AnalysisSession::new(Analyzer::tcpdump().unwrap())
    }

    const SCAN: [&str; 3] = [
        "1.0 10.0.0.1.1234 > 10.0.0.2.22:",
        "1.5 10.0.0.1.1235 > 10.0.0.2.23:",
        "2.0 10.0.0.1.1236 > 10.0.0.2.24:",
    ];

    #[test]
    fn test_run_without_input_is_no_data() {
        let mut s = session();
        let err = s.run(test_params(), &mut |_, _| {}, None).unwrap_err();
        assert!(matches!(err, AnalysisError::NoData));
        assert!(s.current().is_none());
    }

    #[test]
    fn test_load_lines_drops_blank_lines() {
        let mut s = session();
        let input = s.load_lines(["", SCAN[0], "   ", SCAN[1], "\t", SCAN[2]]);
        assert_eq!(input.lines.len(), 3);
        assert!(input.path.is_none());

        let result = s.run(test_params(), &mut |_, _| {}, None).unwrap();
        assert_eq!(result.lines_processed, 3, "Blank lines must not count as processed");
        assert_eq!(result.flagged_sources, vec!["10.0.0.1"]);
    }

    #[test]
    fn test_load_file_and_run() {
        let content = format!("{}\n\n{}\ngarbage line\n{}\n", SCAN[0], SCAN[1], SCAN[2]);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let path = file.path().to_path_buf();

        let mut s = session();
        let input = s.load_file(&path).unwrap();
        assert_eq!(input.lines.len(), 4);
        assert_eq!(input.size_bytes, content.len() as u64);
        assert_eq!(input.path.as_deref(), Some(path.as_path()));

        let result = s.run(test_params(), &mut |_, _| {}, None).unwrap();
        assert_eq!(result.lines_processed, 4);
        assert_eq!(result.valid_events, 3);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.txt");
        let err = session().load_file(&path).unwrap_err();
        match err {
            AnalysisError::Io { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("Expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_new_run_replaces_current_result() {
        let mut s = session();
        s.load_lines(SCAN);
        s.run(test_params(), &mut |_, _| {}, None).unwrap();
        assert_eq!(s.current().map(|r| r.port_scans_detected), Some(1));

        let relaxed = AnalysisParams {
            time_window_secs: 5,
            port_threshold: 3,
        };
        s.run(relaxed, &mut |_, _| {}, None).unwrap();
        assert_eq!(s.current().map(|r| r.port_scans_detected), Some(0));
    }

    #[test]
    fn test_loading_clears_current_result() {
        let mut s = session();
        s.load_lines(SCAN);
        s.run(test_params(), &mut |_, _| {}, None).unwrap();
        s.load_lines(["1.0 10.0.0.5.1 > 10.0.0.2.80:"]);
        assert!(s.current().is_none());
    }

    #[test]
    fn test_reset_keep_file() {
        let mut s = session();
        s.load_lines(SCAN);
        s.run(test_params(), &mut |_, _| {}, None).unwrap();

        s.reset(true);
        assert!(s.current().is_none());
        assert!(s.input().is_some());

        s.reset(false);
        assert!(s.input().is_none());
    }

    #[test]
    fn test_write_report_without_result() {
        let dir = tempfile::tempdir().unwrap();
        let err = session().write_report(&dir.path().join("never.csv")).unwrap_err();
        assert!(matches!(err, ReportError::NoResult));
    }

    #[test]
    fn test_write_report_from_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session-report.csv");
        let mut s = session();
        s.load_lines(SCAN);
        s.run(test_params(), &mut |_, _| {}, None).unwrap();
        s.write_report(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written.lines().collect::<Vec<_>>(),
            vec!["IP,Total_Eventos,Detectado_PortScan", "10.0.0.1,3,Sim"]
        );
    }

    #[test]
    fn test_cancelled_run_keeps_previous_result() {
        let mut s = session();
        s.load_lines(SCAN);
        s.run(test_params(), &mut |_, _| {}, None).unwrap();

        let cancel = AtomicBool::new(true);
        let err = s.run(test_params(), &mut |_, _| {}, Some(&cancel)).unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));
        assert!(s.current().is_some());
    }

    struct PanickingParser;

    impl LineParser for PanickingParser {
        fn parse(&self, _line: &str) -> Option<TrafficEvent> {
            panic!("parser blew up")
        }
        fn name(&self) -> &str {
            "panicking"
        }
        fn expected_format(&self) -> &str {
            ""
        }
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        let mut s = AnalysisSession::new(Analyzer::new(Box::new(PanickingParser)));
        s.load_lines(SCAN);
        let err = s.run(test_params(), &mut |_, _| {}, None).unwrap_err();
        match err {
            AnalysisError::Internal(message) => assert!(message.contains("parser blew up")),
            other => panic!("Expected Internal error, got {:?}", other),
        }
        assert!(s.current().is_none());
    }
}
