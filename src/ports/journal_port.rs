//! Transactional journal persistence port.
//!
//! Every write to accounts, trades, executions and terminal markers happens
//! inside [`JournalPort::transaction`]. Implementations must provide
//! serializable isolation: two concurrent transactions that read the same
//! trade history and both append to it must not both commit.

use std::time::Duration;

use uuid::Uuid;

use crate::domain::error::JournalError;
use crate::domain::execution::Execution;
use crate::domain::trade::{Account, TerminalRecord, Trade};

/// Operations available inside one transaction.
pub trait JournalTx {
    fn insert_account(&mut self, account: &Account) -> Result<(), JournalError>;

    /// Fails with `NotFound` if the account does not exist.
    fn load_account(&mut self, id: Uuid) -> Result<Account, JournalError>;

    fn candle_exists(&mut self, id: Uuid) -> Result<bool, JournalError>;

    fn insert_trade(&mut self, trade: &Trade) -> Result<(), JournalError>;

    /// Loads the trade with its terminal marker. Fails with `NotFound`.
    fn load_trade(&mut self, id: Uuid) -> Result<Trade, JournalError>;

    /// Every trade the account has planned on the candle, oldest first.
    fn trades_for_account_candle(
        &mut self,
        account_id: Uuid,
        candle_id: Uuid,
    ) -> Result<Vec<Trade>, JournalError>;

    /// Executions ordered by `executed_at`, then by insertion order.
    fn load_executions(&mut self, trade_id: Uuid) -> Result<Vec<Execution>, JournalError>;

    /// Sets the marker once. A trade that already carries one is left
    /// untouched and the call fails.
    fn set_terminal_marker(
        &mut self,
        trade_id: Uuid,
        record: &TerminalRecord,
    ) -> Result<(), JournalError>;

    fn insert_execution(&mut self, execution: &Execution) -> Result<(), JournalError>;
}

pub trait JournalPort {
    /// Runs `work` in one serializable transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back on `Err`. A transaction
    /// still running when `timeout` expires is rolled back and reported as
    /// `JournalError::Timeout`. Losing a serialization race is reported as
    /// `JournalError::Conflict`.
    fn transaction<T, F>(&self, timeout: Duration, work: F) -> Result<T, JournalError>
    where
        F: FnOnce(&mut dyn JournalTx) -> Result<T, JournalError>;
}
