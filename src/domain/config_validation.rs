//! Configuration validation.
//!
//! Validates journal, retry and backend settings before any command touches
//! the database.

use crate::domain::error::JournalError;
use crate::domain::forex::DEFAULT_MAX_ENTRY_SLIPPAGE_PIPS;
use crate::ports::config_port::ConfigPort;
use rust_decimal::Decimal;

pub const DEFAULT_TRANSACTION_TIMEOUT_MS: i64 = 5000;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: i64 = 3;
pub const DEFAULT_RETRY_BASE_BACKOFF_MS: i64 = 25;
pub const DEFAULT_RETRY_MAX_BACKOFF_MS: i64 = 500;

pub fn validate_journal_config(config: &dyn ConfigPort) -> Result<(), JournalError> {
    validate_backend(config)?;
    validate_slippage(config)?;
    validate_timeout(config)?;
    validate_retry(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> JournalError {
    JournalError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_backend(config: &dyn ConfigPort) -> Result<(), JournalError> {
    match config.get_string("database", "backend").as_deref() {
        None | Some("sqlite") | Some("postgres") => Ok(()),
        Some(_) => Err(invalid(
            "database",
            "backend",
            "backend must be 'sqlite' or 'postgres'",
        )),
    }
}

fn validate_slippage(config: &dyn ConfigPort) -> Result<(), JournalError> {
    if let Some(raw) = config.get_string("journal", "max_entry_slippage_pips") {
        if raw.trim().parse::<Decimal>().is_err() {
            return Err(invalid(
                "journal",
                "max_entry_slippage_pips",
                "max_entry_slippage_pips must be a decimal number",
            ));
        }
    }
    let value = config.get_decimal(
        "journal",
        "max_entry_slippage_pips",
        DEFAULT_MAX_ENTRY_SLIPPAGE_PIPS,
    );
    if value <= Decimal::ZERO {
        return Err(invalid(
            "journal",
            "max_entry_slippage_pips",
            "max_entry_slippage_pips must be positive",
        ));
    }
    Ok(())
}

fn validate_timeout(config: &dyn ConfigPort) -> Result<(), JournalError> {
    let value = config.get_int("journal", "transaction_timeout_ms", DEFAULT_TRANSACTION_TIMEOUT_MS);
    if value <= 0 {
        return Err(invalid(
            "journal",
            "transaction_timeout_ms",
            "transaction_timeout_ms must be positive",
        ));
    }
    Ok(())
}

fn validate_retry(config: &dyn ConfigPort) -> Result<(), JournalError> {
    let attempts = config.get_int("retry", "max_attempts", DEFAULT_RETRY_MAX_ATTEMPTS);
    if attempts < 1 {
        return Err(invalid("retry", "max_attempts", "max_attempts must be at least 1"));
    }
    let base = config.get_int("retry", "base_backoff_ms", DEFAULT_RETRY_BASE_BACKOFF_MS);
    if base < 0 {
        return Err(invalid(
            "retry",
            "base_backoff_ms",
            "base_backoff_ms must be non-negative",
        ));
    }
    let max = config.get_int("retry", "max_backoff_ms", DEFAULT_RETRY_MAX_BACKOFF_MS);
    if max < base {
        return Err(invalid(
            "retry",
            "max_backoff_ms",
            "max_backoff_ms must not be below base_backoff_ms",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn empty_config_uses_valid_defaults() {
        let config = make_config("[sqlite]\npath = journal.db\n");
        assert!(validate_journal_config(&config).is_ok());
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[database]
backend = postgres

[journal]
max_entry_slippage_pips = 15.5
transaction_timeout_ms = 2000

[retry]
max_attempts = 5
base_backoff_ms = 10
max_backoff_ms = 200
"#,
        );
        assert!(validate_journal_config(&config).is_ok());
    }

    #[test]
    fn unknown_backend_fails() {
        let config = make_config("[database]\nbackend = mysql\n");
        let err = validate_journal_config(&config).unwrap_err();
        assert!(matches!(err, JournalError::ConfigInvalid { key, .. } if key == "backend"));
    }

    #[test]
    fn zero_slippage_fails() {
        let config = make_config("[journal]\nmax_entry_slippage_pips = 0\n");
        let err = validate_journal_config(&config).unwrap_err();
        assert!(matches!(
            err,
            JournalError::ConfigInvalid { key, .. } if key == "max_entry_slippage_pips"
        ));
    }

    #[test]
    fn unparseable_slippage_fails() {
        let config = make_config("[journal]\nmax_entry_slippage_pips = lots\n");
        let err = validate_journal_config(&config).unwrap_err();
        assert!(matches!(
            err,
            JournalError::ConfigInvalid { key, .. } if key == "max_entry_slippage_pips"
        ));
    }

    #[test]
    fn negative_timeout_fails() {
        let config = make_config("[journal]\ntransaction_timeout_ms = -1\n");
        let err = validate_journal_config(&config).unwrap_err();
        assert!(matches!(
            err,
            JournalError::ConfigInvalid { key, .. } if key == "transaction_timeout_ms"
        ));
    }

    #[test]
    fn zero_attempts_fails() {
        let config = make_config("[retry]\nmax_attempts = 0\n");
        let err = validate_journal_config(&config).unwrap_err();
        assert!(matches!(err, JournalError::ConfigInvalid { key, .. } if key == "max_attempts"));
    }

    #[test]
    fn max_backoff_below_base_fails() {
        let config = make_config("[retry]\nbase_backoff_ms = 100\nmax_backoff_ms = 50\n");
        let err = validate_journal_config(&config).unwrap_err();
        assert!(matches!(err, JournalError::ConfigInvalid { key, .. } if key == "max_backoff_ms"));
    }
}
