#![doc = include_str!("../README.md")]

pub mod chunk;
pub mod cli;
pub mod error;
pub mod extract;
pub mod format;
pub mod grouping;
pub mod input;
pub mod matcher;
pub mod pipeline;
pub mod reference;
pub mod remote;
pub mod render;
pub mod report;
pub mod smart_reader;

pub use error::PipelineError;
pub use format::InputFormat;
pub use grouping::{PhenotypeGroup, PhenotypeGroups, group_by_phenotype};
pub use input::InputSource;
pub use matcher::{MatchedRecord, ResultSet, RunStats};
pub use pipeline::{
    CancelToken, Pipeline, PipelineConfig, Run, RunObserver, RunOutput, RunStatus, Step,
};
pub use reference::{ReferenceEntry, ReferenceTable};
pub use render::OutputFormat;
