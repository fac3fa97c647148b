use std::io;

use thiserror::Error;

/// Terminal failures of a parse run.
///
/// Rows that merely fail a skip condition (comments, short rows) never surface
/// here; every variant below ends the run it occurs in.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unable to determine the file type from the header")]
    UnknownFormat,
    #[error(
        "input is {size} bytes (streaming threshold {threshold} bytes) but is not a VCF file"
    )]
    FormatSizeMismatch { size: u64, threshold: u64 },
    #[error("failed to read input after {bytes_read} bytes")]
    SourceRead {
        bytes_read: u64,
        #[source]
        source: io::Error,
    },
    #[error("failed to process chunk {chunk} (line {line}): {reason}")]
    ChunkProcessing {
        chunk: usize,
        line: u64,
        reason: String,
    },
    #[error("reference table unavailable: {reason}")]
    ReferenceTableUnavailable { reason: String },
    #[error("a parse run is already active on this pipeline")]
    RunInProgress,
    #[error("the run already failed; its error was reported by an earlier step")]
    RunHalted,
}

impl PipelineError {
    pub fn reference_unavailable(reason: impl Into<String>) -> Self {
        Self::ReferenceTableUnavailable {
            reason: reason.into(),
        }
    }

    /// Stable short name, used in logs and the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownFormat => "unknown_format",
            Self::FormatSizeMismatch { .. } => "format_size_mismatch",
            Self::SourceRead { .. } => "source_read",
            Self::ChunkProcessing { .. } => "chunk_processing",
            Self::ReferenceTableUnavailable { .. } => "reference_table_unavailable",
            Self::RunInProgress => "run_in_progress",
            Self::RunHalted => "run_halted",
        }
    }
}
