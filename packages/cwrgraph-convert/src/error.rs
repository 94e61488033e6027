use cwrgraph_storage::{ErrorKind, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Malformed input at line {line}: {source}")]
    MalformedInput {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Encode error for record {index}: {source}")]
    Encode {
        index: usize,
        #[source]
        source: StorageError,
    },

    #[error("Encode error for root object: {0}")]
    EncodeRoot(#[source] StorageError),

    #[error("Store error: {0}")]
    Store(#[source] StorageError),

    #[error("Missing field '{field}' on object {index}")]
    MissingField { field: String, index: usize },

    #[error("Missing object for sequence index {index} ({dispatched} dispatched)")]
    MissingIndex { index: usize, dispatched: usize },

    #[error("Object for sequence index {index} beyond {dispatched} dispatched")]
    UnexpectedIndex { index: usize, dispatched: usize },

    #[error("Duplicate object for sequence index {0}")]
    DuplicateIndex(usize),

    #[error("Dangling group: {0}")]
    DanglingGroup(String),

    #[error("Pipeline task panicked: {0}")]
    WorkerPanicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ConvertError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConvertError::MalformedInput { .. } | ConvertError::Io(_) => ErrorCategory::Input,
            ConvertError::DanglingGroup(_) => ErrorCategory::Input,
            ConvertError::Encode { .. } | ConvertError::EncodeRoot(_) | ConvertError::Store(_) => {
                ErrorCategory::Storage
            }
            ConvertError::MissingField { .. }
            | ConvertError::MissingIndex { .. }
            | ConvertError::UnexpectedIndex { .. }
            | ConvertError::DuplicateIndex(_)
            | ConvertError::WorkerPanicked(_) => ErrorCategory::Defect,
            ConvertError::Config(_) => ErrorCategory::Config,
        }
    }
}

impl From<StorageError> for ConvertError {
    fn from(err: StorageError) -> Self {
        ConvertError::Store(err)
    }
}

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Range validation error
    #[error("Invalid range for field '{field}': {value} not in {min}..={max}")]
    Range {
        field: String,
        value: String,
        min: String,
        max: String,
    },

    /// Missing version field in YAML
    #[error("Missing 'version' field in configuration file. Add 'version: 1' to the top of your YAML file.")]
    MissingVersion,

    /// Unsupported version
    #[error("Unsupported configuration version {found}. Supported versions: 1")]
    UnsupportedVersion { found: u32 },

    /// Environment override could not be parsed
    #[error("Invalid value '{value}' for environment variable {var}")]
    InvalidEnv { var: String, value: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Failure classification for callers deciding how to report a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    /// The source file could not be read or is structurally invalid
    Input,
    /// Encoding or persistence failed
    Storage,
    /// Internal invariant broken (missing tag, index gap, panic)
    Defect,
    /// Invalid configuration
    Config,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Input => "input",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Defect => "defect",
            ErrorCategory::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a field lookup failure to the conversion error for that object
pub(crate) fn missing_field(err: StorageError, field: &str, index: usize) -> ConvertError {
    match err.kind {
        ErrorKind::MissingField => ConvertError::MissingField {
            field: field.to_string(),
            index,
        },
        _ => ConvertError::Store(err),
    }
}
