use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use crate::error::PipelineError;

/// Annotation attached to one variant identifier.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct ReferenceEntry {
    pub phenotype: String,
    #[serde(default)]
    pub broken_geno: Option<String>,
    #[serde(default)]
    pub gene: Option<String>,
}

/// Read-only identifier → annotation table.
#[derive(Clone, Debug, Default)]
pub struct ReferenceTable {
    path: Option<PathBuf>,
    entries: HashMap<String, ReferenceEntry>,
}

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid reference JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reference table is empty")]
    Empty,
}

impl From<ReferenceError> for PipelineError {
    fn from(err: ReferenceError) -> Self {
        PipelineError::reference_unavailable(err.to_string())
    }
}

impl ReferenceTable {
    /// Load a JSON object of `id -> { phenotype, broken_geno, gene }`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReferenceError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ReferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut table = Self::from_json_str(&raw)?;
        table.path = Some(path.to_path_buf());
        tracing::info!(
            entries = table.len(),
            path = %path.display(),
            "loaded reference table"
        );
        Ok(table)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ReferenceError> {
        let entries: HashMap<String, ReferenceEntry> = serde_json::from_str(raw)?;
        Self::from_entries(entries)
    }

    pub fn from_entries<I, K>(entries: I) -> Result<Self, ReferenceError>
    where
        I: IntoIterator<Item = (K, ReferenceEntry)>,
        K: Into<String>,
    {
        let entries: HashMap<String, ReferenceEntry> =
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        if entries.is_empty() {
            return Err(ReferenceError::Empty);
        }
        Ok(Self {
            path: None,
            entries,
        })
    }

    pub fn get(&self, rsid: &str) -> Option<&ReferenceEntry> {
        self.entries.get(rsid)
    }

    pub fn contains(&self, rsid: &str) -> bool {
        self.entries.contains_key(rsid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
