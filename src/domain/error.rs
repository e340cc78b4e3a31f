//! Domain error types.

use crate::domain::execution::ExecutionKind;
use crate::domain::lifecycle::TradeState;
use crate::domain::trade::Bias;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Broad category of a [`JournalError`], used by callers to decide whether
/// to surface, retry, or translate an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Timeout,
    Infrastructure,
}

/// Top-level error type for trendjournal.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("invalid geometry: {reason}")]
    Geometry { reason: String },

    #[error("risk exceeded: {reason}")]
    RiskExceeded { reason: String },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("invalid execution sequence at index {index}: cannot {event} from {state} state")]
    InvalidTransition {
        index: usize,
        state: TradeState,
        event: ExecutionKind,
    },

    #[error("{event} recorded before entry")]
    PrematureExecution { event: ExecutionKind },

    #[error("size mismatch: {reason}")]
    SizeMismatch { reason: String },

    #[error("entry slippage {slippage_pips} pips exceeds max {max_pips} pips")]
    SlippageExceeded {
        slippage_pips: Decimal,
        max_pips: Decimal,
    },

    #[error("trade is {state} and accepts no executions")]
    TerminalTrade { state: TradeState },

    #[error("trade already has {count} execution(s)")]
    HasExecutions { count: usize },

    #[error("account already has a {bias} trade {existing} on this candle")]
    DuplicateTrade { bias: Bias, existing: Uuid },

    #[error("unknown rule: {code}")]
    UnknownRule { code: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("transaction conflict: {reason}")]
    Conflict { reason: String },

    #[error("transaction conflict persisted after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },

    #[error("transaction exceeded its {timeout_ms} ms deadline")]
    Timeout { timeout_ms: u64 },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("import error: {reason}")]
    Import { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl JournalError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        JournalError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        JournalError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            JournalError::Geometry { .. }
            | JournalError::RiskExceeded { .. }
            | JournalError::InvalidInput { .. }
            | JournalError::InvalidTransition { .. }
            | JournalError::PrematureExecution { .. }
            | JournalError::SizeMismatch { .. }
            | JournalError::SlippageExceeded { .. }
            | JournalError::TerminalTrade { .. }
            | JournalError::HasExecutions { .. }
            | JournalError::DuplicateTrade { .. }
            | JournalError::UnknownRule { .. } => ErrorKind::Validation,
            JournalError::NotFound { .. } => ErrorKind::NotFound,
            JournalError::Conflict { .. } | JournalError::RetriesExhausted { .. } => {
                ErrorKind::Conflict
            }
            JournalError::Timeout { .. } => ErrorKind::Timeout,
            JournalError::Database { .. }
            | JournalError::DatabaseQuery { .. }
            | JournalError::ConfigParse { .. }
            | JournalError::ConfigMissing { .. }
            | JournalError::ConfigInvalid { .. }
            | JournalError::Import { .. }
            | JournalError::Io(_) => ErrorKind::Infrastructure,
        }
    }

    /// Transient serialization failures may be retried; nothing else may.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

impl From<&JournalError> for std::process::ExitCode {
    fn from(err: &JournalError) -> Self {
        let code: u8 = match err {
            JournalError::ConfigParse { .. }
            | JournalError::ConfigMissing { .. }
            | JournalError::ConfigInvalid { .. } => 2,
            JournalError::Database { .. } | JournalError::DatabaseQuery { .. } => 3,
            _ => match err.kind() {
                ErrorKind::Validation => 4,
                ErrorKind::NotFound => 5,
                ErrorKind::Conflict | ErrorKind::Timeout => 6,
                ErrorKind::Infrastructure => 1,
            },
        };
        std::process::ExitCode::from(code)
    }
}
