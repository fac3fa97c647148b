use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    CancelToken, InputFormat, InputSource, OutputFormat, PhenotypeGroups, Pipeline,
    PipelineConfig, PipelineError, ReferenceTable, RunObserver, RunStats, RunStatus,
    remote,
    render::write_groups,
    report::{Outcome, RunReportBuilder},
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Match consumer genotype exports against an annotated SNP table",
    long_about = None
)]
struct Cli {
    /// Genotype export (23andMe, Ancestry, or VCF; may be gzip-compressed)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Reference table JSON, as a path or URL
    #[arg(long, value_name = "REFERENCE")]
    reference: String,

    /// Input format (sniffed from the header if not specified)
    #[arg(long, value_enum)]
    input_format: Option<InputFormat>,

    /// Output path; results go to stdout when omitted
    #[arg(long, short, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Html)]
    format: OutputFormat,

    /// Bytes read per chunk (overrides SNP_MATCHER_CHUNK_SIZE)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: Option<u64>,

    /// Inputs at or above this many bytes are streamed (VCF only)
    #[arg(long)]
    stream_threshold: Option<u64>,

    /// Write a JSON run report to this path
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Logging verbosity (e.g. error, warn, info, debug)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::from_env();
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = usize::try_from(chunk_size).unwrap_or(usize::MAX);
        }
        if let Some(threshold) = self.stream_threshold {
            config.stream_threshold = threshold;
        }
        config
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let config = cli.pipeline_config();
    let table = load_reference(&cli.reference)?;
    let pipeline = Pipeline::new(&table, config)?;

    let mut report = RunReportBuilder::new();
    report.input_path = cli.input.to_string_lossy().to_string();
    report.reference_origin = cli.reference.clone();
    report.reference_entries = table.len();

    let source = match InputSource::open(&cli.input, config.stream_threshold) {
        Ok(source) => source,
        Err(err) => {
            report.record_error(&err);
            finish_report(cli.report.as_deref(), report, Outcome::Failed, RunStats::default())?;
            return Err(err)
                .with_context(|| format!("failed to open input {}", cli.input.display()));
        }
    };
    report.input_size = source.size();
    report.streamed = source.is_streamed();

    let mut observer = CliObserver::default();
    let status = pipeline.execute(source, cli.input_format, &mut observer, &CancelToken::new());
    report.input_format = observer.format;

    match status {
        RunStatus::Completed(stats) => {
            let groups = observer
                .groups
                .take()
                .ok_or_else(|| anyhow!("run completed without results"))?;
            report.record_groups(&groups);
            write_groups(cli.output.as_deref(), cli.format, &groups)?;
            finish_report(cli.report.as_deref(), report, Outcome::Completed, stats)?;
            print_summary(&stats, &groups);
            Ok(())
        }
        RunStatus::Cancelled => {
            finish_report(cli.report.as_deref(), report, Outcome::Cancelled, RunStats::default())?;
            anyhow::bail!("run cancelled")
        }
        RunStatus::Failed(err) => {
            report.record_error(&err);
            finish_report(cli.report.as_deref(), report, Outcome::Failed, RunStats::default())?;
            Err(err).with_context(|| format!("failed to process {}", cli.input.display()))
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
    Ok(())
}

/// Load the reference table from a path or URL before any input is touched.
fn load_reference(raw: &str) -> Result<ReferenceTable, PipelineError> {
    if let Some(url) = remote::parse_url(raw) {
        let fetched = remote::fetch_reference(&url)
            .map_err(|err| PipelineError::reference_unavailable(format!("{err:#}")))?;
        let table = fetched.into_table()?;
        tracing::info!(entries = table.len(), source = %url, "loaded reference table");
        return Ok(table);
    }
    Ok(ReferenceTable::open(raw)?)
}

fn finish_report(
    path: Option<&Path>,
    builder: RunReportBuilder,
    outcome: Outcome,
    stats: RunStats,
) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    builder
        .build(outcome, stats)
        .write(path)
        .with_context(|| format!("failed to write report {}", path.display()))
}

/// Logs progress every ten percent and keeps the grouped results.
#[derive(Default)]
struct CliObserver {
    format: Option<InputFormat>,
    next_milestone: f64,
    groups: Option<PhenotypeGroups>,
}

impl RunObserver for CliObserver {
    fn on_start(&mut self, format: InputFormat, size: u64) {
        tracing::info!(format = %format, size, "detected input format");
        self.format = Some(format);
    }

    fn on_progress(&mut self, percent: f64) {
        if percent >= self.next_milestone {
            tracing::info!("progress {:.0}%", percent);
            self.next_milestone = (percent / 10.0).floor() * 10.0 + 10.0;
        }
    }

    fn on_complete(&mut self, groups: &PhenotypeGroups) {
        self.groups = Some(groups.clone());
    }

    fn on_error(&mut self, error: &PipelineError) {
        tracing::error!(kind = error.kind(), "{error}");
    }
}

fn print_summary(stats: &RunStats, groups: &PhenotypeGroups) {
    eprintln!(
        "Processed {rows} rows in {batches} chunks; matched {matched} variants across {groups} phenotypes.",
        rows = stats.rows,
        batches = stats.batches,
        matched = stats.matched_rows,
        groups = groups.len(),
    );

    if stats.skipped_rows > 0 {
        eprintln!(
            "Skipped {skipped} comment, header, or short rows.",
            skipped = stats.skipped_rows
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_minimal_arguments() {
        let cli = Cli::parse_from(["snp_matcher", "genome.txt", "--reference", "mps.json"]);
        assert_eq!(cli.input, PathBuf::from("genome.txt"));
        assert_eq!(cli.reference, "mps.json");
        assert_eq!(cli.input_format, None);
        assert_eq!(cli.format, OutputFormat::Html);
        assert_eq!(cli.output, None);
    }

    #[test]
    fn parses_format_overrides() {
        let cli = Cli::parse_from([
            "snp_matcher",
            "genome.csv",
            "--reference",
            "https://example.org/mps-data.json",
            "--input-format",
            "23andme",
            "--format",
            "json",
            "--chunk-size",
            "4096",
            "--stream-threshold",
            "1024",
        ]);
        assert_eq!(cli.input_format, Some(InputFormat::TwentyThreeAndMe));
        assert_eq!(cli.format, OutputFormat::Json);
        let config = cli.pipeline_config();
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.stream_threshold, 1024);
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let result = Cli::try_parse_from([
            "snp_matcher",
            "genome.txt",
            "--reference",
            "mps.json",
            "--chunk-size",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn progress_milestones_are_logged_once() {
        let mut observer = CliObserver::default();
        observer.on_progress(0.0);
        assert_eq!(observer.next_milestone, 10.0);
        observer.on_progress(4.0);
        assert_eq!(observer.next_milestone, 10.0);
        observer.on_progress(37.5);
        assert_eq!(observer.next_milestone, 40.0);
        observer.on_progress(100.0);
        assert_eq!(observer.next_milestone, 110.0);
    }
}
