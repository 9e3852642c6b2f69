//! Error types for spate.
//!
//! A single error family covers the whole crate; every variant carries a
//! stable kind code so callers can match on failures programmatically.

use thiserror::Error;

/// Result type alias for spate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The spate error family.
///
/// All validation errors are raised before any mutation commits: a failed
/// `add_job`, `remove_job` or `merge` leaves the workflow untouched.
#[derive(Error, Debug)]
pub enum Error {
    /// Empty or ill-formed workflow name, job identifier, or path.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A job was declared with neither inputs nor outputs.
    #[error("job '{0}' declares no input nor output path")]
    EmptyJob(String),

    /// The job identifier is already in use.
    #[error("job identifier '{0}' is already taken")]
    DuplicateJob(String),

    /// No job with this identifier exists.
    #[error("unknown job '{0}'")]
    UnknownJob(String),

    /// The same path appears twice in a job's inputs or outputs,
    /// or in both sets at once.
    #[error("duplicate path '{path}' in job '{job}'")]
    DuplicatePath { job: String, path: String },

    /// An output path is already produced by another job.
    #[error("path '{path}' is already produced by job '{producer}'")]
    DoubleProducer { path: String, producer: String },

    /// Adding the job(s) would create a directed cycle.
    #[error("adding job '{0}' would create a cycle")]
    Cycle(String),

    /// Missing variable or malformed template.
    #[error("template error: {0}")]
    Template(String),

    /// A stat or I/O failure other than not-found.
    #[error("filesystem error on '{path}': {source}")]
    Filesystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed document or invariant violation on reload.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A target-contract violation during export or echo.
    #[error("export error: {0}")]
    Export(String),
}

impl Error {
    /// Stable kind code for programmatic matching.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidName(_) => "INVALID_NAME",
            Error::EmptyJob(_) => "EMPTY_JOB",
            Error::DuplicateJob(_) => "DUPLICATE_JOB",
            Error::UnknownJob(_) => "UNKNOWN_JOB",
            Error::DuplicatePath { .. } => "DUPLICATE_PATH",
            Error::DoubleProducer { .. } => "DOUBLE_PRODUCER",
            Error::Cycle(_) => "CYCLE",
            Error::Template(_) => "TEMPLATE_ERROR",
            Error::Filesystem { .. } => "FILESYSTEM_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Export(_) => "EXPORT_ERROR",
        }
    }
}
