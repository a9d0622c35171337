use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while locating, loading or persisting
/// dataset tables.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The manifest lacks a key every dataset must have.
    #[error("manifest {path} is missing mandatory field `{field}`")]
    MissingMandatoryField { path: PathBuf, field: &'static str },

    /// A slot holds neither a table nor a path to one.
    #[error("{kind} slot for {path} holds no table after materialization")]
    InconsistentSlotState { kind: &'static str, path: PathBuf },

    /// A table file does not parse as the expected kind.
    #[error("{kind} table {path} is malformed: {reason}")]
    Format {
        kind: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// A referenced file does not exist.
    #[error("{kind} file {path} not found")]
    NotFound { kind: &'static str, path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest document could not be decoded or encoded.
    #[error("manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    /// An accessor was asked for a key its group does not hold.
    #[error("no `{key}` entry in the {group} group")]
    UnknownKey { group: &'static str, key: String },

    /// A table reached through a group iterator failed to load.
    #[error("{group} entry `{key}`: {source}")]
    Member {
        group: &'static str,
        key: String,
        #[source]
        source: Box<DatasetError>,
    },

    /// Two tables would be saved under the same file name.
    #[error("{first} and {second} tables would both be saved as {path}")]
    DuplicateFileName {
        path: PathBuf,
        first: &'static str,
        second: &'static str,
    },
}

/// Result alias used throughout the crate.
pub type Result<T, E = DatasetError> = std::result::Result<T, E>;

impl DatasetError {
    pub(crate) fn format(kind: &'static str, path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Format {
            kind,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify an error from opening or reading `path`.
    pub(crate) fn from_io(kind: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { kind, path }
        } else {
            Self::Io { path, source }
        }
    }

    pub(crate) fn member(group: &'static str, key: &str, source: DatasetError) -> Self {
        Self::Member {
            group,
            key: key.to_string(),
            source: Box::new(source),
        }
    }

    /// The underlying failure, looking through [`DatasetError::Member`].
    pub fn root(&self) -> &DatasetError {
        match self {
            Self::Member { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error means the content did not match the table kind.
    pub fn is_format(&self) -> bool {
        matches!(self.root(), Self::Format { .. })
    }
}
