//! CLI integration tests.
//!
//! Tests cover:
//! - Journal settings built from INI files (defaults and overrides)
//! - Config validation failures and their exit codes
//! - Argument parsing for the journal commands
//! - Command execution end to end against an on-disk SQLite database

use clap::Parser;
use rust_decimal_macros::dec;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use trendjournal::adapters::file_config_adapter::FileConfigAdapter;
use trendjournal::cli::{self, Cli, Command};
use trendjournal::domain::config_validation::validate_journal_config;
use trendjournal::domain::error::JournalError;
use trendjournal::domain::execution::ExecutionKind;
use trendjournal::domain::forex::Timeframe;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn same_code(actual: ExitCode, expected: ExitCode) -> bool {
    // ExitCode has no PartialEq; compare the debug form
    format!("{actual:?}") == format!("{expected:?}")
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("trendjournal").chain(args.iter().copied())).unwrap()
}

fn sqlite_ini(db_path: &Path) -> String {
    format!(
        "[database]
backend = sqlite

[sqlite]
path = {}

[journal]
max_entry_slippage_pips = 5
transaction_timeout_ms = 2000

[retry]
max_attempts = 2
base_backoff_ms = 1
max_backoff_ms = 4

[logging]
level = warn
",
        db_path.display()
    )
}

mod config_loading {
    use super::*;

    #[test]
    fn settings_use_defaults() {
        let adapter = FileConfigAdapter::from_string("[database]\nbackend = sqlite\n").unwrap();
        validate_journal_config(&adapter).unwrap();
        let settings = cli::build_journal_settings(&adapter);

        assert_eq!(settings.max_entry_slippage_pips, dec!(20));
        assert_eq!(settings.transaction_timeout, Duration::from_millis(5000));
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.base_backoff, Duration::from_millis(25));
        assert_eq!(settings.retry.max_backoff, Duration::from_millis(500));
    }

    #[test]
    fn settings_read_overrides() {
        let adapter = FileConfigAdapter::from_string(&sqlite_ini(Path::new("/tmp/j.db"))).unwrap();
        validate_journal_config(&adapter).unwrap();
        let settings = cli::build_journal_settings(&adapter);

        assert_eq!(settings.max_entry_slippage_pips, dec!(5));
        assert_eq!(settings.transaction_timeout, Duration::from_millis(2000));
        assert_eq!(settings.retry.max_attempts, 2);
        assert_eq!(settings.retry.base_backoff, Duration::from_millis(1));
        assert_eq!(settings.retry.max_backoff, Duration::from_millis(4));
    }

    #[test]
    fn invalid_config_exits_with_config_code() {
        let file = write_temp_ini("[journal]\nmax_entry_slippage_pips = -3\n");
        let path = file.path().to_str().unwrap();
        let trade = uuid::Uuid::new_v4().to_string();
        let code = cli::run(parse(&["status", "--config", path, "--trade", &trade]));
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn missing_config_file_exits_with_config_code() {
        let code = cli::run(parse(&["init-db", "--config", "/nonexistent/trendjournal.ini"]));
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn missing_sqlite_path_is_reported() {
        let file = write_temp_ini("[database]\nbackend = sqlite\n");
        let path = file.path().to_str().unwrap();
        let code = cli::run(parse(&["init-db", "--config", path]));
        assert!(same_code(code, ExitCode::from(2)));
    }
}

mod argument_parsing {
    use super::*;

    #[test]
    fn record_arguments() {
        let trade = uuid::Uuid::new_v4();
        let cli = parse(&[
            "record",
            "--config",
            "journal.ini",
            "--trade",
            &trade.to_string(),
            "--kind",
            "partial_close",
            "--price",
            "1.1020",
            "--size",
            "0.40",
            "--at",
            "2024-03-04T10:00:00Z",
        ]);
        match cli.command {
            Command::Record {
                trade: t,
                kind,
                price,
                size,
                reason,
                at,
                ..
            } => {
                assert_eq!(t, trade);
                assert_eq!(kind, ExecutionKind::PartialClose);
                assert_eq!(price, dec!(1.1020));
                assert_eq!(size, dec!(0.40));
                assert_eq!(reason, None);
                assert_eq!(at.unwrap().to_rfc3339(), "2024-03-04T10:00:00+00:00");
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn series_defaults_to_weekly_eurusd() {
        match parse(&["backfill-indicators", "--config", "journal.ini"]).command {
            Command::BackfillIndicators {
                symbol, timeframe, ..
            } => {
                assert_eq!(symbol, "EURUSD");
                assert_eq!(timeframe, Timeframe::W1);
            }
            other => panic!("expected backfill-indicators, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_and_marker_are_rejected() {
        let trade = uuid::Uuid::new_v4().to_string();
        let bad_kind = Cli::try_parse_from([
            "trendjournal", "record", "--config", "j.ini", "--trade", trade.as_str(), "--kind",
            "stop_out", "--price", "1.1", "--size", "1",
        ]);
        assert!(bad_kind.is_err());

        let bad_marker = Cli::try_parse_from([
            "trendjournal", "terminate", "--config", "j.ini", "--trade", trade.as_str(), "--marker",
            "closed", "--reason", "x",
        ]);
        assert!(bad_marker.is_err());
    }

    #[test]
    fn sessions_needs_no_config() {
        let code = cli::run(parse(&["sessions", "--at", "2024-12-25T14:00:00Z"]));
        assert!(same_code(code, ExitCode::SUCCESS));
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_end_to_end {
    use super::*;
    use serde_json::Value;
    use trendjournal::adapters::sqlite_adapter::SqliteAdapter;
    use trendjournal::ports::market_data_port::MarketDataPort;

    // decimals serialize as strings
    fn decimal(value: &Value) -> rust_decimal::Decimal {
        value.as_str().unwrap().parse().unwrap()
    }

    const CANDLES_CSV: &str = "Date,Open,High,Low,Close,Volume\n\
        2024-02-19,1.0780,1.0890,1.0760,1.0820,\n\
        2024-02-26,1.0820,1.0860,1.0790,1.0840,\n\
        bad-row,1,1,1,1,\n\
        2024-03-04,1.0840,1.0980,1.0830,1.0950,\n";

    struct Fixture {
        _dir: tempfile::TempDir,
        ini: tempfile::NamedTempFile,
        csv: std::path::PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::TempDir::new().unwrap();
            let ini = write_temp_ini(&sqlite_ini(&dir.path().join("journal.db")));
            let csv = dir.path().join("eurusd_w1.csv");
            std::fs::write(&csv, CANDLES_CSV).unwrap();
            Fixture { _dir: dir, ini, csv }
        }

        fn config_path(&self) -> &str {
            self.ini.path().to_str().unwrap()
        }

        fn execute(&self, args: &[&str]) -> Result<Value, JournalError> {
            let config = FileConfigAdapter::from_file(self.ini.path()).unwrap();
            let settings = cli::build_journal_settings(&config);
            let store = SqliteAdapter::from_config(&config).unwrap();
            let mut full: Vec<&str> = args.to_vec();
            full.extend(["--config", self.config_path()]);
            let json = cli::execute(&store, &settings, parse(&full).command)?;
            Ok(serde_json::from_str(&json).unwrap())
        }

        fn store(&self) -> SqliteAdapter {
            let config = FileConfigAdapter::from_file(self.ini.path()).unwrap();
            SqliteAdapter::from_config(&config).unwrap()
        }
    }

    #[test]
    fn journal_commands_end_to_end() {
        let fx = Fixture::new();
        let code = cli::run(parse(&["init-db", "--config", fx.config_path()]));
        assert!(same_code(code, ExitCode::SUCCESS));

        let import = fx
            .execute(&["import-candles", "--file", fx.csv.to_str().unwrap()])
            .unwrap();
        assert_eq!(import["inserted"], 3);
        assert_eq!(import["skipped_rows"], 1);

        let backfill = fx.execute(&["backfill-indicators"]).unwrap();
        assert_eq!(backfill["candles"], 3);
        assert_eq!(backfill["with_ema200"], 0);

        let batch = fx.execute(&["evaluate"]).unwrap();
        assert_eq!(batch["evaluated"], 3);

        let candle_id = fx.store().list_candles("EURUSD", Timeframe::W1).unwrap()[2].id;
        let single = fx
            .execute(&["evaluate", "--candle", &candle_id.to_string()])
            .unwrap();
        assert_eq!(single["W1_TREND_BULLISH"]["outcome"], "FAIL");

        let account = fx
            .execute(&[
                "add-account",
                "--name",
                "Main",
                "--balance",
                "10000",
                "--leverage",
                "30",
                "--max-risk-pct",
                "2",
            ])
            .unwrap();
        let account_id = account["id"].as_str().unwrap().to_string();

        let trade = fx
            .execute(&[
                "plan-trade",
                "--account",
                &account_id,
                "--candle",
                &candle_id.to_string(),
                "--bias",
                "long",
                "--entry",
                "1.1000",
                "--sl",
                "1.0990",
                "--tp",
                "1.1030",
                "--risk-pct",
                "1",
                "--reason",
                "weekly trend continuation",
            ])
            .unwrap();
        assert_eq!(decimal(&trade["planned_position_size"]), dec!(1.00));
        assert_eq!(decimal(&trade["planned_rr"]), dec!(3.00));
        let trade_id = trade["id"].as_str().unwrap().to_string();

        fx.execute(&[
            "record", "--trade", &trade_id, "--kind", "entry", "--price", "1.1001", "--size",
            "1.00", "--at", "2024-03-05T08:00:00Z",
        ])
        .unwrap();
        let close = fx
            .execute(&[
                "record", "--trade", &trade_id, "--kind", "manual_close", "--price", "1.1011",
                "--size", "1.00", "--at", "2024-03-06T08:00:00Z", "--reason", "Friday close",
            ])
            .unwrap();
        assert_eq!(decimal(&close["pnl_pips"]), dec!(10));
        assert_eq!(decimal(&close["pnl"]), dec!(100));

        let status = fx.execute(&["status", "--trade", &trade_id]).unwrap();
        assert_eq!(status["state"], "closed");
        assert_eq!(decimal(&status["remaining_position"]), dec!(0));
        assert_eq!(decimal(&status["realized_pnl"]), dec!(100));

        let err = fx
            .execute(&[
                "terminate", "--trade", &trade_id, "--marker", "cancelled", "--reason", "too late",
            ])
            .unwrap_err();
        assert!(matches!(err, JournalError::HasExecutions { count: 2 }));
    }

    #[test]
    fn entry_slippage_from_config_is_enforced() {
        let fx = Fixture::new();
        fx.store().initialize_schema().unwrap();
        fx.execute(&["import-candles", "--file", fx.csv.to_str().unwrap()])
            .unwrap();
        let candle_id = fx.store().list_candles("EURUSD", Timeframe::W1).unwrap()[0].id;

        let account = fx
            .execute(&[
                "add-account", "--name", "Main", "--balance", "10000", "--leverage", "30",
                "--max-risk-pct", "2",
            ])
            .unwrap();
        let trade = fx
            .execute(&[
                "plan-trade", "--account", account["id"].as_str().unwrap(), "--candle",
                &candle_id.to_string(), "--bias", "long", "--entry", "1.1000", "--sl", "1.0990",
                "--tp", "1.1030", "--risk-pct", "1", "--reason", "pullback",
            ])
            .unwrap();

        // config allows 5 pips
        let err = fx
            .execute(&[
                "record", "--trade", trade["id"].as_str().unwrap(), "--kind", "entry", "--price",
                "1.1006", "--size", "1.00",
            ])
            .unwrap_err();
        assert!(matches!(err, JournalError::SlippageExceeded { .. }));
    }

    #[test]
    fn unknown_trade_exits_with_not_found_code() {
        let fx = Fixture::new();
        fx.store().initialize_schema().unwrap();
        let code = cli::run(parse(&[
            "status",
            "--config",
            fx.config_path(),
            "--trade",
            &uuid::Uuid::new_v4().to_string(),
        ]));
        assert!(same_code(code, ExitCode::from(5)));
    }
}
