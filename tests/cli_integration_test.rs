//! CLI integration tests for the simulate command orchestration.
//!
//! Tests cover:
//! - Settings resolution from INI files on disk
//! - Opening CSV (and SQLite) market data
//! - Full pipeline with MockMarketData
//! - `run` exit codes for the three subcommands

mod common;

use approx::assert_relative_eq;
use clap::Parser;
use common::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use stonks::adapters::csv_report_adapter::CsvReportAdapter;
use stonks::adapters::file_config_adapter::FileConfigAdapter;
use stonks::cli::{self, Cli, DataSource, Overrides, SymbolSelection};
use stonks::domain::error::StonksError;
use stonks::domain::signal::StrategyKind;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn exit_code_text(code: std::process::ExitCode) -> String {
    format!("{:?}", code)
}

const DAILY_HEADER: &str = "date,open,high,low,close,adjusted_close,volume\n";
const INDICATOR_HEADER: &str = "date,macd,macd_hist,macd_signal,sma50,rsi\n";

/// Writes the two-symbol week from `common::two_symbol_week` as CSV files.
fn write_csv_fixture(dir: &Path) {
    let aaa = [
        ("2024-01-05", 100.0, -1.0),
        ("2024-01-08", 100.0, -0.5),
        ("2024-01-09", 100.0, 0.5),
        ("2024-01-10", 110.0, 1.0),
        ("2024-01-11", 120.0, 2.0),
        ("2024-01-12", 130.0, 3.0),
    ];
    let bbb = [
        ("2024-01-05", 50.0, -1.0),
        ("2024-01-08", 50.0, 1.0),
        ("2024-01-09", 50.0, 1.0),
        ("2024-01-10", 50.0, 1.0),
        ("2024-01-11", 60.0, -1.0),
        ("2024-01-12", 55.0, -1.0),
    ];
    for (symbol, rows) in [("AAA", &aaa), ("BBB", &bbb)] {
        let mut daily = String::from(DAILY_HEADER);
        let mut indicators = String::from(INDICATOR_HEADER);
        for (date, price, hist) in rows.iter() {
            daily.push_str(&format!(
                "{date},{price},{price},{price},{price},{price},1000\n"
            ));
            indicators.push_str(&format!("{date},1.0,{hist},,,\n"));
        }
        fs::write(dir.join(format!("{symbol}_daily.csv")), daily).unwrap();
        fs::write(dir.join(format!("{symbol}_indicators.csv")), indicators).unwrap();
    }
}

fn fixture_ini(data_dir: &Path) -> String {
    format!(
        r#"
[data]
source = csv
path = {}

[ledger]
initial_cash = 10000
min_buy = 1000
max_buy = 7000
transaction_fee = 7
tax_rate = 0.25

[simulation]
symbols = AAA,BBB
start_date = 2024-01-08
end_date = 2024-01-12
strategy = macd-histogram

[logging]
level = warn
"#,
        data_dir.display()
    )
}

mod settings {
    use super::*;

    #[test]
    fn settings_from_ini_on_disk() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_ini(&fixture_ini(dir.path()));
        let config = cli::load_config(Some(file.path())).unwrap();

        let settings =
            cli::build_run_settings(&config, &Overrides::default(), date(2030, 1, 1)).unwrap();

        assert_eq!(
            settings.symbols,
            SymbolSelection::List(vec!["AAA".into(), "BBB".into()])
        );
        assert_eq!(settings.start_date, jan(8));
        assert_eq!(settings.end_date, jan(12));
        assert_eq!(settings.strategy, StrategyKind::MacdHistogram);
        assert_eq!(settings.source, DataSource::Csv);
        assert_eq!(settings.data_path, dir.path());
        assert_relative_eq!(settings.ledger.initial_cash, 10_000.0);
    }

    #[test]
    fn unknown_strategy_in_config_is_invalid() {
        let config = FileConfigAdapter::from_string(
            "[simulation]\nsymbols = AAA\nstrategy = coin-flip\n",
        )
        .unwrap();
        let err = cli::build_run_settings(&config, &Overrides::default(), jan(12)).unwrap_err();
        assert!(matches!(err, StonksError::ConfigInvalid { key, .. } if key == "strategy"));
    }

    #[test]
    fn missing_config_file_is_parse_error() {
        let err = cli::load_config(Some(Path::new("/nonexistent/stonks.ini")))
            .err()
            .unwrap();
        assert!(matches!(err, StonksError::ConfigParse { .. }));
    }
}

mod pipeline {
    use super::*;

    fn settings(symbols: &str) -> cli::RunSettings {
        let config = FileConfigAdapter::from_string(&fixture_ini(Path::new("unused"))).unwrap();
        let overrides = Overrides {
            symbols: Some(symbols.into()),
            ..Overrides::default()
        };
        cli::build_run_settings(&config, &overrides, jan(31)).unwrap()
    }

    #[test]
    fn pipeline_with_mock_port() {
        let port = two_symbol_week();

        let (report, journal) =
            cli::run_simulation_pipeline(&port, &settings("AAA,BBB"), None).unwrap();

        assert_eq!(journal.trades().count(), 3);
        assert_relative_eq!(report.cash, 8_129.0, epsilon = 1e-9);
        assert_relative_eq!(report.total_value, 11_899.0, epsilon = 1e-9);
        assert_relative_eq!(report.total_fees, 21.0, epsilon = 1e-9);
        assert_relative_eq!(report.total_taxes, 350.0, epsilon = 1e-9);
    }

    #[test]
    fn star_resolves_every_stored_symbol() {
        let port = two_symbol_week();

        let (report, _) = cli::run_simulation_pipeline(&port, &settings("*"), None).unwrap();

        let symbols: Vec<_> = report.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAA", "BBB"]);
    }

    #[test]
    fn empty_store_with_star_has_no_symbols() {
        let port = MockMarketData::new();
        let err = cli::run_simulation_pipeline(&port, &settings("*"), None).unwrap_err();
        assert!(matches!(err, StonksError::NoSymbols));
    }

    #[test]
    fn csv_files_match_mock_results() {
        let dir = TempDir::new().unwrap();
        write_csv_fixture(dir.path());
        let config = FileConfigAdapter::from_string(&fixture_ini(dir.path())).unwrap();
        let settings =
            cli::build_run_settings(&config, &Overrides::default(), jan(31)).unwrap();
        let port = cli::open_market_data(settings.source, &settings.data_path, &config).unwrap();

        let (report, _) = cli::run_simulation_pipeline(port.as_ref(), &settings, None).unwrap();

        assert_eq!(report.terminal_date, jan(12));
        assert_relative_eq!(report.cash, 8_129.0, epsilon = 1e-9);
        assert_relative_eq!(report.depot_value, 3_770.0, epsilon = 1e-9);
    }

    #[test]
    fn pipeline_writes_report_and_journal() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("profits.csv");
        let port = two_symbol_week();

        cli::run_simulation_pipeline(&port, &settings("AAA,BBB"), Some(&output)).unwrap();

        let profits = fs::read_to_string(&output).unwrap();
        assert_eq!(profits.lines().count(), 3);
        assert!(profits.lines().nth(1).unwrap().starts_with("AAA,29,"));

        let journal = fs::read_to_string(CsvReportAdapter::journal_path(&output)).unwrap();
        assert!(journal.contains("2024-01-08,BBB,bought,140,"));
        assert!(journal.contains("2024-01-11,BBB,sold,140,"));
    }

    #[test]
    fn lowercase_symbols_read_lowercase_files() {
        let dir = TempDir::new().unwrap();
        write_csv_fixture(dir.path());
        for suffix in ["daily", "indicators"] {
            fs::rename(
                dir.path().join(format!("AAA_{suffix}.csv")),
                dir.path().join(format!("aaa_{suffix}.csv")),
            )
            .unwrap();
        }
        let config = FileConfigAdapter::from_string(&fixture_ini(dir.path())).unwrap();
        let overrides = Overrides {
            symbols: Some("aaa,BBB".into()),
            ..Overrides::default()
        };
        let settings = cli::build_run_settings(&config, &overrides, jan(31)).unwrap();
        let port = cli::open_market_data(settings.source, &settings.data_path, &config).unwrap();

        let (report, _) = cli::run_simulation_pipeline(port.as_ref(), &settings, None).unwrap();

        assert_eq!(report.rows[0].symbol, "aaa");
        assert_relative_eq!(report.total_value, 11_899.0, epsilon = 1e-9);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_source_matches_mock_results() {
        use stonks::adapters::sqlite_adapter::SqliteAdapter;

        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("market.db");
        let seed = SqliteAdapter::open(&db_path.to_string_lossy(), 1).unwrap();
        seed.initialize_schema().unwrap();
        let mock = two_symbol_week();
        for series in mock.series.values() {
            seed.insert_bars(series.bars()).unwrap();
            seed.insert_indicators(series.indicators()).unwrap();
        }
        drop(seed);

        let config = FileConfigAdapter::from_string(&fixture_ini(dir.path())).unwrap();
        let mut settings =
            cli::build_run_settings(&config, &Overrides::default(), jan(31)).unwrap();
        settings.source = DataSource::Sqlite;
        settings.data_path = db_path;
        let port = cli::open_market_data(settings.source, &settings.data_path, &config).unwrap();

        let (report, _) = cli::run_simulation_pipeline(port.as_ref(), &settings, None).unwrap();

        assert_relative_eq!(report.cash, 8_129.0, epsilon = 1e-9);
        assert_relative_eq!(report.total_value, 11_899.0, epsilon = 1e-9);
    }
}

mod run_command {
    use super::*;

    #[test]
    fn simulate_succeeds_on_csv_fixture() {
        let dir = TempDir::new().unwrap();
        write_csv_fixture(dir.path());
        let ini = write_temp_ini(&fixture_ini(dir.path()));
        let output = dir.path().join("out.csv");

        let cli = Cli::parse_from([
            "stonks",
            "simulate",
            "--config",
            &ini.path().to_string_lossy(),
            "--output",
            &output.to_string_lossy(),
        ]);
        let code = cli::run(cli);

        assert_eq!(
            exit_code_text(code),
            exit_code_text(std::process::ExitCode::SUCCESS)
        );
        assert!(output.exists());
    }

    #[test]
    fn simulate_unknown_reference_exits_with_data_code() {
        let dir = TempDir::new().unwrap();
        write_csv_fixture(dir.path());
        let ini = write_temp_ini(&fixture_ini(dir.path()));

        let cli = Cli::parse_from([
            "stonks",
            "simulate",
            "NOPE,AAA",
            "--config",
            &ini.path().to_string_lossy(),
        ]);

        assert_eq!(
            exit_code_text(cli::run(cli)),
            exit_code_text(std::process::ExitCode::from(5))
        );
    }

    #[test]
    fn flags_complete_sqlite_config_without_path() {
        let dir = TempDir::new().unwrap();
        write_csv_fixture(dir.path());
        let ini = write_temp_ini(
            "[data]\nsource = sqlite\n\n[simulation]\nsymbols = AAA,BBB\n\
             start_date = 2024-01-08\nend_date = 2024-01-12\n",
        );

        let cli = Cli::parse_from([
            "stonks",
            "simulate",
            "--config",
            &ini.path().to_string_lossy(),
            "--source",
            "csv",
            "--data-dir",
            &dir.path().to_string_lossy(),
        ]);

        assert_eq!(
            exit_code_text(cli::run(cli)),
            exit_code_text(std::process::ExitCode::SUCCESS)
        );
    }

    #[test]
    fn sqlite_flag_without_path_exits_with_config_code() {
        let cli = Cli::parse_from(["stonks", "simulate", "AAA", "--source", "sqlite"]);

        assert_eq!(
            exit_code_text(cli::run(cli)),
            exit_code_text(std::process::ExitCode::from(2))
        );
    }

    #[test]
    fn validate_rejects_sqlite_without_path() {
        let ini = write_temp_ini("[data]\nsource = sqlite\n");
        let cli = Cli::parse_from(["stonks", "validate", "-c", &ini.path().to_string_lossy()]);

        assert_eq!(
            exit_code_text(cli::run(cli)),
            exit_code_text(std::process::ExitCode::from(2))
        );
    }

    #[test]
    fn validate_rejects_bad_ledger() {
        let ini = write_temp_ini("[ledger]\ntax_rate = 1.5\n");
        let cli = Cli::parse_from(["stonks", "validate", "-c", &ini.path().to_string_lossy()]);

        assert_eq!(
            exit_code_text(cli::run(cli)),
            exit_code_text(std::process::ExitCode::from(2))
        );
    }

    #[test]
    fn validate_accepts_fixture() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&fixture_ini(dir.path()));
        let cli = Cli::parse_from(["stonks", "validate", "-c", &ini.path().to_string_lossy()]);

        assert_eq!(
            exit_code_text(cli::run(cli)),
            exit_code_text(std::process::ExitCode::SUCCESS)
        );
    }

    #[test]
    fn info_lists_csv_symbols() {
        let dir = TempDir::new().unwrap();
        write_csv_fixture(dir.path());
        let cli = Cli::parse_from([
            "stonks",
            "info",
            "--data-dir",
            &dir.path().to_string_lossy(),
        ]);

        assert_eq!(
            exit_code_text(cli::run(cli)),
            exit_code_text(std::process::ExitCode::SUCCESS)
        );
    }

    #[test]
    fn missing_data_dir_exits_with_database_code() {
        let cli = Cli::parse_from([
            "stonks",
            "simulate",
            "AAA",
            "--data-dir",
            "/nonexistent/stonks/data",
        ]);

        assert_eq!(
            exit_code_text(cli::run(cli)),
            exit_code_text(std::process::ExitCode::from(3))
        );
    }
}
