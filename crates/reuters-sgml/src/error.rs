use std::io;
use std::path::{Path, PathBuf};
use std::str::Utf8Error;

use thiserror::Error;

/// File content is not valid UTF-8.
#[derive(Debug, Error)]
#[error("content is not valid UTF-8 (first invalid byte at offset {valid_up_to})")]
pub struct DecodeError {
    pub valid_up_to: usize,
    #[source]
    source: Utf8Error,
}

impl From<Utf8Error> for DecodeError {
    fn from(source: Utf8Error) -> Self {
        Self {
            valid_up_to: source.valid_up_to(),
            source,
        }
    }
}

/// A single fragment could not be turned into a record.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ExtractError {
    #[error("document {}: malformed {field}: {reason}", .reuters_id.as_deref().unwrap_or("?"))]
    MalformedDocument {
        reuters_id: Option<String>,
        field: &'static str,
        reason: String,
    },
    #[error("document {}: unknown month code {code:?}", .reuters_id.as_deref().unwrap_or("?"))]
    UnknownMonth {
        reuters_id: Option<String>,
        code: String,
    },
}

impl ExtractError {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        ExtractError::MalformedDocument {
            reuters_id: None,
            field,
            reason: reason.into(),
        }
    }

    /// Attach the fragment's `NEWID` when the error does not carry one yet.
    pub fn with_reuters_id(mut self, id: Option<&str>) -> Self {
        let slot = match &mut self {
            ExtractError::MalformedDocument { reuters_id, .. } => reuters_id,
            ExtractError::UnknownMonth { reuters_id, .. } => reuters_id,
        };
        if slot.is_none() {
            *slot = id.map(str::to_string);
        }
        self
    }
}

/// Failure to turn decoded or raw content into records.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("fragment #{position}: {source}")]
    Document {
        position: usize,
        #[source]
        source: ExtractError,
    },
}

/// Failure to load one corpus file.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error parsing data file ({}): {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },
}

impl CorpusError {
    /// Path of the file that failed.
    pub fn path(&self) -> &Path {
        match self {
            CorpusError::Io { path, .. } | CorpusError::Load { path, .. } => path,
        }
    }

    /// Whether the file was rejected for its encoding.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            CorpusError::Load {
                source: LoadError::Decode(_),
                ..
            }
        )
    }
}
