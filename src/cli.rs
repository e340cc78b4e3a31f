//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::adapters::csv_adapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    validate_journal_config, DEFAULT_RETRY_BASE_BACKOFF_MS, DEFAULT_RETRY_MAX_ATTEMPTS,
    DEFAULT_RETRY_MAX_BACKOFF_MS, DEFAULT_TRANSACTION_TIMEOUT_MS,
};
use crate::domain::error::JournalError;
use crate::domain::evaluation;
use crate::domain::execution::{ExecutionKind, ExecutionRequest};
use crate::domain::forex::{Timeframe, DEFAULT_MAX_ENTRY_SLIPPAGE_PIPS, SYMBOL_EURUSD};
use crate::domain::journal::{self, JournalSettings};
use crate::domain::retry::RetryPolicy;
use crate::domain::session::derive_sessions;
use crate::domain::trade::{Bias, NewAccount, TerminalMarker, TradePlan};
use crate::ports::config_port::ConfigPort;
use crate::ports::journal_port::JournalPort;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "trendjournal", about = "Forex trade journal and trend rule checker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Import candles from a CSV file
    ImportCandles {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long, default_value = SYMBOL_EURUSD)]
        symbol: String,
        #[arg(long, default_value = "W1")]
        timeframe: Timeframe,
    },
    /// Recompute EMAs and swings for a candle series
    BackfillIndicators {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value = SYMBOL_EURUSD)]
        symbol: String,
        #[arg(long, default_value = "W1")]
        timeframe: Timeframe,
    },
    /// Evaluate trend rules for one candle, or for the whole series
    Evaluate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        candle: Option<Uuid>,
        #[arg(long, default_value = SYMBOL_EURUSD)]
        symbol: String,
        #[arg(long, default_value = "W1")]
        timeframe: Timeframe,
    },
    /// Create a trading account
    AddAccount {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        balance: Decimal,
        #[arg(long)]
        leverage: u32,
        #[arg(long)]
        max_risk_pct: Decimal,
        #[arg(long, default_value = "UTC")]
        timezone: String,
    },
    /// Plan and size a trade
    PlanTrade {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        account: Uuid,
        #[arg(long)]
        candle: Uuid,
        #[arg(long)]
        bias: Bias,
        #[arg(long)]
        entry: Decimal,
        #[arg(long)]
        sl: Decimal,
        #[arg(long)]
        tp: Decimal,
        #[arg(long)]
        risk_pct: Decimal,
        #[arg(long)]
        reason: String,
    },
    /// Record an execution against a trade
    Record {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        trade: Uuid,
        #[arg(long)]
        kind: ExecutionKind,
        #[arg(long)]
        price: Decimal,
        #[arg(long)]
        size: Decimal,
        #[arg(long)]
        reason: Option<String>,
        /// RFC 3339 execution time, defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Cancel or invalidate a trade that was never entered
    Terminate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        trade: Uuid,
        #[arg(long)]
        marker: TerminalMarker,
        #[arg(long)]
        reason: String,
    },
    /// Show a trade's state, open size and realized PnL
    Status {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        trade: Uuid,
    },
    /// List the trading sessions open at an instant
    Sessions {
        #[arg(long)]
        at: DateTime<Utc>,
    },
}

impl Command {
    fn config_path(&self) -> Option<&Path> {
        match self {
            Command::InitDb { config }
            | Command::ImportCandles { config, .. }
            | Command::BackfillIndicators { config, .. }
            | Command::Evaluate { config, .. }
            | Command::AddAccount { config, .. }
            | Command::PlanTrade { config, .. }
            | Command::Record { config, .. }
            | Command::Terminate { config, .. }
            | Command::Status { config, .. } => Some(config),
            Command::Sessions { .. } => None,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let Some(config_path) = cli.command.config_path().map(Path::to_path_buf) else {
        init_logging(None);
        return match cli.command {
            Command::Sessions { at } => print_json(&sessions_output(at)),
            _ => ExitCode::FAILURE,
        };
    };

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    init_logging(Some(&config as &dyn ConfigPort));
    debug!(config = %config_path.display(), "config loaded");

    if let Err(e) = validate_journal_config(&config) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    let settings = build_journal_settings(&config);

    match open_and_execute(&config, &settings, cli.command) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

/// `RUST_LOG` wins, then `[logging] level`, then `info`. Output goes to
/// stderr so stdout stays machine-readable.
pub fn init_logging(config: Option<&dyn ConfigPort>) {
    let level = config
        .and_then(|c| c.get_string("logging", "level"))
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // a second init (tests, repeated runs) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Assumes the config already passed [`validate_journal_config`].
pub fn build_journal_settings(config: &dyn ConfigPort) -> JournalSettings {
    let millis = |section: &str, key: &str, default: i64| {
        Duration::from_millis(config.get_int(section, key, default).max(0) as u64)
    };
    JournalSettings {
        max_entry_slippage_pips: config.get_decimal(
            "journal",
            "max_entry_slippage_pips",
            DEFAULT_MAX_ENTRY_SLIPPAGE_PIPS,
        ),
        transaction_timeout: millis(
            "journal",
            "transaction_timeout_ms",
            DEFAULT_TRANSACTION_TIMEOUT_MS,
        ),
        retry: RetryPolicy {
            max_attempts: config
                .get_int("retry", "max_attempts", DEFAULT_RETRY_MAX_ATTEMPTS)
                .clamp(1, i64::from(u32::MAX)) as u32,
            base_backoff: millis("retry", "base_backoff_ms", DEFAULT_RETRY_BASE_BACKOFF_MS),
            max_backoff: millis("retry", "max_backoff_ms", DEFAULT_RETRY_MAX_BACKOFF_MS),
        },
    }
}

/// Storage backend the commands run against.
pub trait Store: JournalPort + MarketDataPort {
    fn initialize_schema(&self) -> Result<(), JournalError>;
}

#[cfg(feature = "sqlite")]
impl Store for crate::adapters::sqlite_adapter::SqliteAdapter {
    fn initialize_schema(&self) -> Result<(), JournalError> {
        crate::adapters::sqlite_adapter::SqliteAdapter::initialize_schema(self)
    }
}

#[cfg(feature = "postgres")]
impl Store for crate::adapters::postgres_adapter::PostgresAdapter {
    fn initialize_schema(&self) -> Result<(), JournalError> {
        crate::adapters::postgres_adapter::PostgresAdapter::initialize_schema(self)
    }
}

fn open_and_execute(
    config: &dyn ConfigPort,
    settings: &JournalSettings,
    command: Command,
) -> Result<String, JournalError> {
    let backend = config
        .get_string("database", "backend")
        .unwrap_or_else(|| "sqlite".to_string());
    if backend == "postgres" {
        open_postgres(config, settings, command)
    } else {
        open_sqlite(config, settings, command)
    }
}

fn open_sqlite(
    config: &dyn ConfigPort,
    settings: &JournalSettings,
    command: Command,
) -> Result<String, JournalError> {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        let store = SqliteAdapter::from_config(config)?;
        execute(&store, settings, command)
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, settings, command);
        Err(feature_missing("sqlite"))
    }
}

fn open_postgres(
    config: &dyn ConfigPort,
    settings: &JournalSettings,
    command: Command,
) -> Result<String, JournalError> {
    #[cfg(feature = "postgres")]
    {
        use crate::adapters::postgres_adapter::PostgresAdapter;
        let store = PostgresAdapter::from_config(config)?;
        execute(&store, settings, command)
    }

    #[cfg(not(feature = "postgres"))]
    {
        let _ = (config, settings, command);
        Err(feature_missing("postgres"))
    }
}

#[allow(dead_code)]
fn feature_missing(backend: &str) -> JournalError {
    JournalError::ConfigInvalid {
        section: "database".into(),
        key: "backend".into(),
        reason: format!("built without the {backend} feature"),
    }
}

#[derive(Serialize)]
struct SessionsOutput {
    at: DateTime<Utc>,
    sessions: Vec<&'static str>,
}

fn sessions_output(at: DateTime<Utc>) -> SessionsOutput {
    SessionsOutput {
        at,
        sessions: derive_sessions(at).iter().map(|s| s.as_str()).collect(),
    }
}

#[derive(Serialize)]
struct ImportOutput {
    file: String,
    rows: usize,
    skipped_rows: usize,
    inserted: usize,
    duplicates: usize,
}

/// Runs one command against an open store and renders its result as JSON.
pub fn execute<S: Store>(
    store: &S,
    settings: &JournalSettings,
    command: Command,
) -> Result<String, JournalError> {
    match command {
        Command::InitDb { .. } => {
            store.initialize_schema()?;
            to_json(&serde_json::json!({ "initialized": true }))
        }
        Command::ImportCandles {
            file,
            symbol,
            timeframe,
            ..
        } => {
            let read = csv_adapter::read_candles(&file, &symbol, timeframe)?;
            let summary = evaluation::import_candles(store, &read.candles)?;
            to_json(&ImportOutput {
                file: file.display().to_string(),
                rows: read.candles.len(),
                skipped_rows: read.skipped_rows,
                inserted: summary.inserted,
                duplicates: summary.duplicates,
            })
        }
        Command::BackfillIndicators {
            symbol, timeframe, ..
        } => to_json(&evaluation::backfill_indicators(store, &symbol, timeframe)?),
        Command::Evaluate {
            candle: Some(candle_id),
            ..
        } => to_json(&evaluation::evaluate_candle(store, candle_id)?),
        Command::Evaluate {
            candle: None,
            symbol,
            timeframe,
            ..
        } => to_json(&evaluation::evaluate_all_candles(store, &symbol, timeframe)?),
        Command::AddAccount {
            name,
            balance,
            leverage,
            max_risk_pct,
            timezone,
            ..
        } => to_json(&journal::create_account(
            store,
            settings,
            NewAccount {
                name,
                balance,
                leverage,
                max_risk_pct,
                timezone,
            },
        )?),
        Command::PlanTrade {
            account,
            candle,
            bias,
            entry,
            sl,
            tp,
            risk_pct,
            reason,
            ..
        } => to_json(&journal::create_trade(
            store,
            settings,
            TradePlan {
                account_id: account,
                candle_id: candle,
                bias,
                planned_entry: entry,
                planned_sl: sl,
                planned_tp: tp,
                planned_risk_pct: risk_pct,
                reason,
            },
        )?),
        Command::Record {
            trade,
            kind,
            price,
            size,
            reason,
            at,
            ..
        } => to_json(&journal::record_execution(
            store,
            settings,
            &ExecutionRequest {
                trade_id: trade,
                kind,
                price,
                position_size: size,
                reason,
                executed_at: at.unwrap_or_else(Utc::now),
            },
        )?),
        Command::Terminate {
            trade,
            marker,
            reason,
            ..
        } => to_json(&journal::set_terminal_marker(
            store, settings, trade, marker, &reason,
        )?),
        Command::Status { trade, .. } => to_json(&journal::trade_status(store, settings, trade)?),
        Command::Sessions { at } => to_json(&sessions_output(at)),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JournalError> {
    serde_json::to_string_pretty(value).map_err(|e| JournalError::Io(e.into()))
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match to_json(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
