//! Structured run report for downstream tool consumption.
//!
//! Written as JSON when `--report` is given: input/reference metadata,
//! the outcome of the run, row statistics, and per-phenotype counts.

use serde::Serialize;
use std::path::Path;

use crate::error::PipelineError;
use crate::format::InputFormat;
use crate::grouping::PhenotypeGroups;
use crate::matcher::RunStats;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Tool version
    pub version: String,
    /// Timestamp of run (RFC 3339)
    pub timestamp: String,
    pub input: InputInfo,
    pub reference: ReferenceInfo,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub statistics: RunStats,
    pub phenotypes: Vec<PhenotypeCount>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputInfo {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub size: u64,
    pub streamed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceInfo {
    pub origin: String,
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhenotypeCount {
    pub phenotype: String,
    pub records: usize,
}

impl RunReport {
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        tracing::info!("Wrote run report to {}", path.display());
        Ok(())
    }
}

/// Collects report fields while a run is driven.
#[derive(Debug, Default)]
pub struct RunReportBuilder {
    pub input_path: String,
    pub input_format: Option<InputFormat>,
    pub input_size: u64,
    pub streamed: bool,
    pub reference_origin: String,
    pub reference_entries: usize,
    pub error: Option<ErrorInfo>,
    pub phenotypes: Vec<PhenotypeCount>,
}

impl RunReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&mut self, error: &PipelineError) {
        self.error = Some(ErrorInfo {
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    pub fn record_groups(&mut self, groups: &PhenotypeGroups) {
        self.phenotypes = groups
            .iter()
            .map(|g| PhenotypeCount {
                phenotype: g.phenotype.clone(),
                records: g.records.len(),
            })
            .collect();
    }

    pub fn build(self, outcome: Outcome, statistics: RunStats) -> RunReport {
        let timestamp = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        RunReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp,
            input: InputInfo {
                path: self.input_path,
                format: self.input_format.map(|f| f.name().to_string()),
                size: self.input_size,
                streamed: self.streamed,
            },
            reference: ReferenceInfo {
                origin: self.reference_origin,
                entries: self.reference_entries,
            },
            outcome,
            error: self.error,
            statistics,
            phenotypes: self.phenotypes,
        }
    }
}
