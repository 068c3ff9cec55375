use std::fmt;

use thiserror::Error as ThisError;

use crate::{config::Version, rewriter::RebuildStep};

pub type Result<T> = std::result::Result<T, Error>;
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Parameterize(#[from] ParameterizeError),
    #[error(transparent)]
    Execute(#[from] ExecutionError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Connect(#[from] ConnectError),
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Classify(_) => ErrorCode::UnrecognizedQuery,
            Self::Parameterize(ParameterizeError::StatementTooLarge { .. }) => {
                ErrorCode::StatementTooLarge
            }
            Self::Execute(ExecutionError::StatementFailed { source, .. }) => {
                ErrorCode::Engine(source.code)
            }
            Self::Execute(ExecutionError::LockContention { .. }) => ErrorCode::LockContention,
            Self::Execute(ExecutionError::FollowUpDepthExceeded { .. }) => {
                ErrorCode::FollowUpDepthExceeded
            }
            Self::Transaction(TransactionError::AlreadyActive) => ErrorCode::TransactionActive,
            Self::Connect(_) => ErrorCode::Connect,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ClassifyError {
    #[error("could not determine query type: {sql}")]
    Unrecognized { sql: String },
    #[error("could not determine query type: unsupported SHOW command: {sql}")]
    UnsupportedShow { sql: String },
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ParameterizeError {
    #[error("statement too large to parse ({len} bytes, limit {limit})")]
    StatementTooLarge { len: usize, limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Execute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Prepare => "prepare",
            Self::Execute => "execute",
        })
    }
}

#[derive(Debug, ThisError)]
pub enum ExecutionError {
    #[error("statement {step} failed during {phase}{}: {source}", rebuild_context(.context))]
    StatementFailed {
        step: usize,
        phase: Phase,
        sql: String,
        context: Option<RebuildStep>,
        #[source]
        source: EngineError,
    },
    #[error("lock contention: database still {} after {attempts} attempts during {phase}", .source.code)]
    LockContention {
        attempts: u32,
        phase: Phase,
        sql: String,
        #[source]
        source: EngineError,
    },
    #[error("follow-up statements nested deeper than {limit} levels")]
    FollowUpDepthExceeded { limit: usize },
}

fn rebuild_context(context: &Option<RebuildStep>) -> String {
    context.map(|step| format!(" ({step})")).unwrap_or_default()
}

impl ExecutionError {
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::StatementFailed { sql, .. } | Self::LockContention { sql, .. } => Some(sql),
            Self::FollowUpDepthExceeded { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum TransactionError {
    #[error("a transaction is already active on this connection")]
    AlreadyActive,
}

#[derive(Debug, ThisError)]
pub enum ConnectError {
    #[error("failed to open database `{database}`: {source}")]
    Open {
        database: String,
        #[source]
        source: EngineError,
    },
    #[error("invalid engine version `{raw}`")]
    InvalidVersion { raw: String },
    #[error("engine version {found} is older than the supported minimum {minimum}")]
    UnsupportedVersion { found: Version, minimum: Version },
}

/// Failure reported by the embedded engine for a single call.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("{message}")]
pub struct EngineError {
    pub code: EngineErrorCode,
    pub message: String,
}

impl EngineError {
    pub fn new(code: EngineErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn busy() -> Self {
        Self::new(EngineErrorCode::Busy, "database is locked")
    }

    pub fn locked() -> Self {
        Self::new(EngineErrorCode::Locked, "database table is locked")
    }

    pub fn other(code: i32, message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::Other(code), message)
    }

    /// Raised for a missing table the engine did not itself reject. Carries
    /// the engine's generic error code.
    pub fn no_such_table(table: &str) -> Self {
        Self::other(1, format!("no such table: {table}"))
    }

    pub fn is_transient(&self) -> bool {
        self.code.is_transient()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorCode {
    Busy,
    Locked,
    /// Any other engine failure, with the engine's extended result code.
    Other(i32),
}

impl EngineErrorCode {
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Busy | Self::Locked)
    }
}

impl fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("busy"),
            Self::Locked => f.write_str("locked"),
            Self::Other(code) => write!(f, "error {code}"),
        }
    }
}

/// Stable failure category carried in [`crate::ExecutionOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnrecognizedQuery,
    StatementTooLarge,
    LockContention,
    TransactionActive,
    FollowUpDepthExceeded,
    Connect,
    Engine(EngineErrorCode),
}

impl ErrorCode {
    pub fn category(self) -> &'static str {
        match self {
            Self::UnrecognizedQuery => "classify",
            Self::StatementTooLarge => "parameterize",
            Self::LockContention | Self::FollowUpDepthExceeded | Self::Engine(_) => "execute",
            Self::TransactionActive => "transaction",
            Self::Connect => "connect",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnrecognizedQuery => f.write_str("unrecognized_query"),
            Self::StatementTooLarge => f.write_str("statement_too_large"),
            Self::LockContention => f.write_str("lock_contention"),
            Self::TransactionActive => f.write_str("transaction_active"),
            Self::FollowUpDepthExceeded => f.write_str("follow_up_depth_exceeded"),
            Self::Connect => f.write_str("connect"),
            Self::Engine(code) => write!(f, "engine {code}"),
        }
    }
}
