//! Run lifecycle: format resolution, chunk-by-chunk matching, grouping.
//!
//! A [`Run`] processes exactly one batch per [`Run::step`] call, so a host can
//! interleave progress display or cancellation checks between chunks.
//! [`Pipeline::execute`] is the callback-driven loop most callers want.

use std::{
    io::Read,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    chunk::{ChunkError, ChunkedRows, DEFAULT_CHUNK_SIZE},
    error::PipelineError,
    format::{self, InputFormat},
    grouping::{PhenotypeGroups, group_by_phenotype},
    input::{DEFAULT_STREAM_THRESHOLD, InputSource},
    matcher::{ProgressState, ResultSet, RunStats},
    reference::ReferenceTable,
    smart_reader::ByteCounter,
};

const CHUNK_SIZE_ENV: &str = "SNP_MATCHER_CHUNK_SIZE";
const STREAM_THRESHOLD_ENV: &str = "SNP_MATCHER_STREAM_THRESHOLD";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub stream_threshold: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            stream_threshold: DEFAULT_STREAM_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `SNP_MATCHER_CHUNK_SIZE` / `SNP_MATCHER_STREAM_THRESHOLD`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(chunk_size) = env_number::<usize>(CHUNK_SIZE_ENV).filter(|&n| n > 0) {
            config.chunk_size = chunk_size;
        }
        if let Some(threshold) = env_number::<u64>(STREAM_THRESHOLD_ENV) {
            config.stream_threshold = threshold;
        }
        config
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

/// Cooperative cancellation flag, checked between chunks.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Receives the events of one run.
///
/// For a given run, exactly one of `on_complete` or `on_error` is called,
/// unless the run is cancelled, in which case neither is.
pub trait RunObserver {
    /// Called once the format is resolved, before any row is read.
    fn on_start(&mut self, _format: InputFormat, _size: u64) {}

    /// Percentage in `[0, 100]`, non-decreasing within a run.
    fn on_progress(&mut self, _percent: f64) {}

    fn on_complete(&mut self, groups: &PhenotypeGroups);

    fn on_error(&mut self, error: &PipelineError);
}

#[derive(Debug)]
pub enum RunStatus {
    Completed(RunStats),
    Cancelled,
    Failed(PipelineError),
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub format: InputFormat,
    pub groups: PhenotypeGroups,
    pub stats: RunStats,
    pub bytes_processed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// One batch was absorbed; carries the current percentage.
    Progress(f64),
    /// The source is exhausted.
    Finished,
    /// An earlier step failed; the run produces nothing further.
    Halted,
}

/// Matches exports against a borrowed reference table, one run at a time.
pub struct Pipeline<'t> {
    table: &'t ReferenceTable,
    config: PipelineConfig,
    active: AtomicBool,
}

impl<'t> Pipeline<'t> {
    pub fn new(table: &'t ReferenceTable, config: PipelineConfig) -> Result<Self, PipelineError> {
        if table.is_empty() {
            return Err(PipelineError::reference_unavailable("reference table is empty"));
        }
        Ok(Self {
            table,
            config,
            active: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    pub fn table(&self) -> &'t ReferenceTable {
        self.table
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Begin a run. `format` forces a format instead of sniffing the header.
    pub fn start(
        &self,
        source: InputSource,
        format: Option<InputFormat>,
    ) -> Result<Run<'_>, PipelineError> {
        if self.active.swap(true, Ordering::AcqRel) {
            return Err(PipelineError::RunInProgress);
        }
        let guard = ActiveGuard(&self.active);

        let format = resolve_format(&source, format, self.config.stream_threshold)?;
        tracing::info!(
            format = %format,
            input = %source.name(),
            size = source.size(),
            streamed = source.is_streamed(),
            chunk_size = self.config.chunk_size,
            "starting run",
        );

        let progress = ProgressState::new(source.size());
        let (reader, counter) = source.into_parts();
        Ok(Run {
            _guard: guard,
            table: self.table,
            format,
            rows: ChunkedRows::with_chunk_size(reader, format.delimiter(), self.config.chunk_size),
            counter,
            progress,
            results: Some(ResultSet::new()),
            state: RunState::Running,
        })
    }

    /// Drive a run to completion, reporting through `observer`.
    pub fn execute(
        &self,
        source: InputSource,
        format: Option<InputFormat>,
        observer: &mut dyn RunObserver,
        cancel: &CancelToken,
    ) -> RunStatus {
        let mut run = match self.start(source, format) {
            Ok(run) => run,
            Err(err) => return fail(observer, err),
        };
        observer.on_start(run.format(), run.progress().total());
        observer.on_progress(0.0);

        loop {
            if cancel.is_cancelled() {
                tracing::info!(processed = run.progress().processed(), "run cancelled");
                return RunStatus::Cancelled;
            }
            match run.step() {
                Ok(Step::Progress(percent)) => observer.on_progress(percent),
                Ok(Step::Finished | Step::Halted) => break,
                Err(err) => return fail(observer, err),
            }
        }

        match run.into_output() {
            Some(output) => {
                observer.on_progress(100.0);
                observer.on_complete(&output.groups);
                RunStatus::Completed(output.stats)
            }
            None => RunStatus::Cancelled,
        }
    }
}

fn fail(observer: &mut dyn RunObserver, err: PipelineError) -> RunStatus {
    tracing::warn!(kind = err.kind(), error = %err, "run failed");
    observer.on_error(&err);
    RunStatus::Failed(err)
}

fn resolve_format(
    source: &InputSource,
    forced: Option<InputFormat>,
    stream_threshold: u64,
) -> Result<InputFormat, PipelineError> {
    if source.is_streamed() {
        // Header sniffing is skipped for streams; only VCF may be streamed.
        let is_vcf = match forced {
            Some(format) => format == InputFormat::Vcf,
            None => format::has_vcf_extension(source.name()),
        };
        if !is_vcf {
            return Err(PipelineError::FormatSizeMismatch {
                size: source.size(),
                threshold: stream_threshold,
            });
        }
        return Ok(InputFormat::Vcf);
    }

    match forced {
        Some(format) => Ok(format),
        None => {
            let first_line = source.first_line().unwrap_or_default();
            format::detect_with_name(&first_line, source.name())
        }
    }
}

struct ActiveGuard<'p>(&'p AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum RunState {
    Running,
    Finished,
    Failed,
}

/// One in-flight parse. Dropping it releases the pipeline for the next run.
pub struct Run<'p> {
    _guard: ActiveGuard<'p>,
    table: &'p ReferenceTable,
    format: InputFormat,
    rows: ChunkedRows<Box<dyn Read + Send>>,
    counter: Option<ByteCounter>,
    progress: ProgressState,
    results: Option<ResultSet>,
    state: RunState,
}

impl Run<'_> {
    pub fn format(&self) -> InputFormat {
        self.format
    }

    pub fn progress(&self) -> ProgressState {
        self.progress
    }

    pub fn stats(&self) -> RunStats {
        self.results.as_ref().map(ResultSet::stats).unwrap_or_default()
    }

    /// Process the next batch.
    pub fn step(&mut self) -> Result<Step, PipelineError> {
        match self.state {
            RunState::Finished => return Ok(Step::Finished),
            RunState::Failed => return Ok(Step::Halted),
            RunState::Running => {}
        }

        let batch = match self.rows.next() {
            None => {
                self.state = RunState::Finished;
                self.progress.finish();
                let stats = self.stats();
                tracing::info!(
                    rows = stats.rows,
                    skipped = stats.skipped_rows,
                    matched = stats.matched_rows,
                    batches = stats.batches,
                    "run complete"
                );
                return Ok(Step::Finished);
            }
            Some(Ok(batch)) => batch,
            Some(Err(err)) => {
                // Partial results from a failed run are never handed out.
                self.state = RunState::Failed;
                self.results = None;
                return Err(match err {
                    ChunkError::Io { bytes_read, source } => {
                        PipelineError::SourceRead { bytes_read, source }
                    }
                    ChunkError::Malformed { chunk, line, kind } => PipelineError::ChunkProcessing {
                        chunk,
                        line,
                        reason: kind.to_string(),
                    },
                });
            }
        };

        let results = self.results.take().unwrap_or_default();
        self.results = Some(results.absorb(&batch, self.format, self.table));

        let processed = match &self.counter {
            Some(counter) => counter.get(),
            None => batch.bytes_consumed,
        };
        self.progress.advance(processed);
        let percent = self.progress.percent();
        tracing::debug!(
            chunk = batch.index,
            rows = batch.rows.len(),
            processed,
            percent,
            "processed chunk"
        );
        Ok(Step::Progress(percent))
    }

    /// Group the results of a finished run; `None` if it failed or is unfinished.
    pub fn into_output(mut self) -> Option<RunOutput> {
        if self.state != RunState::Finished {
            return None;
        }
        let results = self.results.take()?;
        let stats = results.stats();
        Some(RunOutput {
            format: self.format,
            groups: group_by_phenotype(results),
            stats,
            bytes_processed: self.progress.processed(),
        })
    }

    /// Step until the source is exhausted, then group.
    ///
    /// A run whose failure was already returned by [`Run::step`] yields
    /// [`PipelineError::RunHalted`].
    pub fn finish(mut self) -> Result<RunOutput, PipelineError> {
        while let Step::Progress(_) = self.step()? {}
        self.into_output().ok_or(PipelineError::RunHalted)
    }
}
