// =============================================================================
// report.rs - CSV Report Writer
// =============================================================================
//
// Persists an AnalysisResult as a comma-delimited UTF-8 table:
//
//   IP,Total_Eventos,Detectado_PortScan
//   10.0.0.1,3,Sim
//   10.0.0.7,1,Não
//
// One row per distinct source, in ranking order (count descending, ties by
// first appearance). The third column is "Sim" for flagged sources and "Não"
// otherwise. The destination file is truncated and rewritten.
//
// Quoting and escaping are delegated to the `csv` crate; addresses never need
// quoting, but the writer stays correct if a future parser yields odd tokens.
//
// =============================================================================

use crate::analysis::AnalysisResult;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const REPORT_HEADER: [&str; 3] = ["IP", "Total_Eventos", "Detectado_PortScan"];

/// File name used when nothing else is configured.
pub const DEFAULT_REPORT_FILENAME: &str = "relatorio.csv";

const FLAGGED: &str = "Sim";
const NOT_FLAGGED: &str = "Não";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot write report to {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("no analysis result to report; run an analysis first")]
    NoResult,
}

/// Writes the report for `result` to `path`, replacing any existing file.
///
/// The table is encoded in memory first, so an encoding failure leaves the
/// previous file untouched.
pub fn write_report(result: &AnalysisResult, path: &Path) -> Result<(), ReportError> {
    let mut buffer = Vec::new();
    write_report_to(result, &mut buffer)?;

    fs::write(path, &buffer).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(
        path = %path.display(),
        rows = result.event_counts.len(),
        bytes = buffer.len(),
        "report written"
    );
    Ok(())
}

/// Writes the report for `result` into any writer.
pub fn write_report_to<W: Write>(result: &AnalysisResult, writer: W) -> Result<(), ReportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(REPORT_HEADER)?;

    for (source, count) in result.event_counts.ranked() {
        let label = if result.is_flagged(&source) {
            FLAGGED
        } else {
            NOT_FLAGGED
        };
        let count = count.to_string();
        csv_writer.write_record([source.as_str(), count.as_str(), label])?;
    }

    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}
