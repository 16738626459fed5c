//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    parse_date, validate_config, validate_fixed_config, DEFAULT_POOL_SIZE,
};
use crate::domain::error::StonksError;
use crate::domain::journal::{EntryKind, Journal};
use crate::domain::ledger::LedgerConfig;
use crate::domain::signal::StrategyKind;
use crate::domain::simulation::{run_simulation, SimulationConfig};
use crate::domain::valuation::{value_portfolio, Report};
use crate::logging;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_START_DATE: &str = "2021-01-01";
pub const DEFAULT_DATA_PATH: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "stonks", about = "Rule-based equity trading simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation over a date range
    Simulate {
        /// Comma-separated symbols, or `*` for every stored symbol
        symbols: Option<String>,
        /// First day to simulate (YYYY-MM-DD)
        from: Option<NaiveDate>,
        /// Last day to simulate (YYYY-MM-DD)
        to: Option<NaiveDate>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// CSV directory or SQLite database file
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long, value_enum)]
        source: Option<DataSource>,
        #[arg(long, value_enum)]
        strategy: Option<StrategyKind>,
        /// Write the profit table (and a sibling journal) as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show data range for symbol(s)
    Info {
        symbols: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long, value_enum)]
        source: Option<DataSource>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DataSource {
    #[default]
    Csv,
    Sqlite,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Csv => f.write_str("csv"),
            DataSource::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(DataSource::Csv),
            "sqlite" => Ok(DataSource::Sqlite),
            other => Err(format!("unknown data source '{other}'")),
        }
    }
}

/// Which symbols to simulate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSelection {
    /// Every symbol the data store knows about.
    All,
    List(Vec<String>),
}

impl SymbolSelection {
    pub fn parse(input: &str) -> Self {
        if input.trim() == "*" {
            return SymbolSelection::All;
        }
        SymbolSelection::List(
            input
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// The first resolved symbol is the calendar reference.
    pub fn resolve(&self, port: &dyn MarketDataPort) -> Result<Vec<String>, StonksError> {
        let symbols = match self {
            SymbolSelection::All => port.list_symbols()?,
            SymbolSelection::List(list) => list.clone(),
        };
        if symbols.is_empty() {
            return Err(StonksError::NoSymbols);
        }
        Ok(symbols)
    }
}

/// Everything a simulate run needs once config and flags are merged.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub symbols: SymbolSelection,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub strategy: StrategyKind,
    pub ledger: LedgerConfig,
    pub source: DataSource,
    pub data_path: PathBuf,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub symbols: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub data_dir: Option<PathBuf>,
    pub source: Option<DataSource>,
    pub strategy: Option<StrategyKind>,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Simulate {
            symbols,
            from,
            to,
            config,
            data_dir,
            source,
            strategy,
            output,
        } => {
            let overrides = Overrides {
                symbols,
                from,
                to,
                data_dir,
                source,
                strategy,
            };
            run_simulate(config.as_deref(), &overrides, output.as_deref())
        }
        Command::Info {
            symbols,
            config,
            data_dir,
            source,
        } => {
            let overrides = Overrides {
                symbols,
                data_dir,
                source,
                ..Overrides::default()
            };
            run_info(config.as_deref(), &overrides)
        }
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, StonksError> {
    match path {
        Some(p) => FileConfigAdapter::from_file(p),
        None => Ok(FileConfigAdapter::empty()),
    }
}

fn init_logging(config: &dyn ConfigPort) {
    let level = config.get_string("logging", "level");
    // Fails when a subscriber is already installed, e.g. run twice in one process.
    if let Err(e) = logging::init_logging(level.as_deref()) {
        eprintln!("warning: {e}");
    }
}

pub fn build_ledger_config(config: &dyn ConfigPort) -> LedgerConfig {
    let defaults = LedgerConfig::default();
    LedgerConfig {
        initial_cash: config.get_double("ledger", "initial_cash", defaults.initial_cash),
        min_buy: config.get_double("ledger", "min_buy", defaults.min_buy),
        max_buy: config.get_double("ledger", "max_buy", defaults.max_buy),
        transaction_fee: config.get_double("ledger", "transaction_fee", defaults.transaction_fee),
        tax_rate: config.get_double("ledger", "tax_rate", defaults.tax_rate),
    }
}

/// Merges flags over config over defaults.
pub fn build_run_settings(
    config: &dyn ConfigPort,
    overrides: &Overrides,
    today: NaiveDate,
) -> Result<RunSettings, StonksError> {
    let symbols = overrides
        .symbols
        .clone()
        .or_else(|| config.get_string("simulation", "symbols"))
        .map(|s| SymbolSelection::parse(&s))
        .ok_or(StonksError::NoSymbols)?;

    let start_date = match overrides.from {
        Some(d) => d,
        None => parse_date(
            &config
                .get_string("simulation", "start_date")
                .unwrap_or_else(|| DEFAULT_START_DATE.to_string()),
            "simulation",
            "start_date",
        )?,
    };
    let end_date = match overrides.to {
        Some(d) => d,
        None => match config.get_string("simulation", "end_date") {
            Some(s) => parse_date(&s, "simulation", "end_date")?,
            None => today,
        },
    };
    if start_date > end_date {
        return Err(StonksError::ConfigInvalid {
            section: "simulation".into(),
            key: "start_date".into(),
            reason: format!("start date {} is after end date {}", start_date, end_date),
        });
    }

    let strategy = match overrides.strategy {
        Some(s) => s,
        None => match config.get_string("simulation", "strategy") {
            Some(name) => name.parse::<StrategyKind>().map_err(|reason| {
                StonksError::ConfigInvalid {
                    section: "simulation".into(),
                    key: "strategy".into(),
                    reason,
                }
            })?,
            None => StrategyKind::default(),
        },
    };

    let (source, data_path) = resolve_data_location(config, overrides)?;

    Ok(RunSettings {
        symbols,
        start_date,
        end_date,
        strategy,
        ledger: build_ledger_config(config),
        source,
        data_path,
    })
}

fn resolve_data_location(
    config: &dyn ConfigPort,
    overrides: &Overrides,
) -> Result<(DataSource, PathBuf), StonksError> {
    let source = match overrides.source {
        Some(s) => s,
        None => match config.get_string("data", "source") {
            Some(s) => s.parse::<DataSource>().map_err(|reason| StonksError::ConfigInvalid {
                section: "data".into(),
                key: "source".into(),
                reason,
            })?,
            None => DataSource::default(),
        },
    };
    let path = match overrides
        .data_dir
        .clone()
        .or_else(|| config.get_string("data", "path").map(PathBuf::from))
    {
        Some(path) => path,
        // The csv directory has a default; a database file does not.
        None if source == DataSource::Sqlite => {
            return Err(StonksError::ConfigMissing {
                section: "data".into(),
                key: "path".into(),
            });
        }
        None => PathBuf::from(DEFAULT_DATA_PATH),
    };
    Ok((source, path))
}

pub fn open_market_data(
    source: DataSource,
    path: &Path,
    config: &dyn ConfigPort,
) -> Result<Box<dyn MarketDataPort>, StonksError> {
    if !path.exists() {
        return Err(StonksError::Database {
            reason: format!("{} data not found at {}", source, path.display()),
        });
    }
    match source {
        DataSource::Csv => Ok(Box::new(CsvAdapter::new(path.to_path_buf()))),
        #[cfg(feature = "sqlite")]
        DataSource::Sqlite => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            let pool_size = config.get_int("sqlite", "pool_size", DEFAULT_POOL_SIZE) as u32;
            Ok(Box::new(SqliteAdapter::open(
                &path.to_string_lossy(),
                pool_size,
            )?))
        }
        #[cfg(not(feature = "sqlite"))]
        DataSource::Sqlite => {
            let _ = config;
            Err(StonksError::ConfigInvalid {
                section: "data".into(),
                key: "source".into(),
                reason: "sqlite feature is required".into(),
            })
        }
    }
}

/// Simulates, values and optionally writes the report.
pub fn run_simulation_pipeline(
    port: &dyn MarketDataPort,
    settings: &RunSettings,
    output_path: Option<&Path>,
) -> Result<(Report, Journal), StonksError> {
    let symbols = settings.symbols.resolve(port)?;
    let strategy = settings.strategy.strategy();
    info!(
        symbols = symbols.len(),
        from = %settings.start_date,
        to = %settings.end_date,
        strategy = %settings.strategy,
        "starting simulation"
    );

    let config = SimulationConfig {
        start_date: settings.start_date,
        end_date: settings.end_date,
        symbols,
        ledger: settings.ledger.clone(),
    };
    let result = run_simulation(port, &strategy, &config)?;
    let report = value_portfolio(&result.ledger, port, result.terminal_date);

    if let Some(path) = output_path {
        CsvReportAdapter::new().write_with_journal(&report, &result.journal, path)?;
        info!(path = %path.display(), "report written");
    }

    Ok((report, result.journal))
}

pub fn print_summary(report: &Report, journal: &Journal) {
    println!("=== Profit by symbol ===");
    for row in &report.rows {
        println!(
            "  {:<8} held {:>6} @ {:>10.2}  realized {:>12.2}  unrealized {:>12.2}  total {:>12.2}",
            row.symbol,
            row.amount_held,
            row.average_cost,
            row.realized_profit,
            row.unrealized_profit,
            row.total_profit(),
        );
    }

    let trades = journal.trades().count();
    let skipped = journal.count_where(|k| matches!(k, EntryKind::Skipped(_)));
    let failed = journal.count_where(|k| matches!(k, EntryKind::Failed { .. }));

    println!("\n=== Portfolio on {} ===", report.terminal_date);
    println!("Cash:          {:.2}", report.cash);
    println!("Depot value:   {:.2}", report.depot_value);
    println!("Total value:   {:.2}", report.total_value);
    println!("Total return:  {:.2}%", report.total_return() * 100.0);
    println!("Fees paid:     {:.2}", report.total_fees);
    println!("Taxes paid:    {:.2}", report.total_taxes);
    println!("Trades:        {}", trades);
    println!("Skipped:       {}", skipped);
    println!("Failed:        {}", failed);
}

fn run_simulate(
    config_path: Option<&Path>,
    overrides: &Overrides,
    output_path: Option<&Path>,
) -> Result<(), StonksError> {
    let config = load_config(config_path)?;
    init_logging(&config);
    validate_fixed_config(&config)?;

    let today = chrono::Local::now().date_naive();
    let settings = build_run_settings(&config, overrides, today)?;
    let port = open_market_data(settings.source, &settings.data_path, &config)?;

    let (report, journal) = run_simulation_pipeline(port.as_ref(), &settings, output_path)?;
    print_summary(&report, &journal);
    Ok(())
}

fn run_info(config_path: Option<&Path>, overrides: &Overrides) -> Result<(), StonksError> {
    let config = load_config(config_path)?;
    init_logging(&config);
    validate_fixed_config(&config)?;

    let (source, path) = resolve_data_location(&config, overrides)?;
    let port = open_market_data(source, &path, &config)?;

    let selection = overrides
        .symbols
        .as_deref()
        .map(SymbolSelection::parse)
        .unwrap_or(SymbolSelection::All);
    for symbol in selection.resolve(port.as_ref())? {
        match port.data_range(&symbol) {
            Ok(Some((min_date, max_date, count))) => {
                println!("{}: {} bars, {} to {}", symbol, count, min_date, max_date);
            }
            Ok(None) => {
                eprintln!("{}: no data found", symbol);
            }
            Err(e) => {
                eprintln!("error querying {}: {}", symbol, e);
            }
        }
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), StonksError> {
    eprintln!("Validating config: {}", config_path.display());
    let config = FileConfigAdapter::from_file(config_path)?;
    validate_config(&config)?;
    let (source, path) = resolve_data_location(&config, &Overrides::default())?;
    eprintln!("\nData: {} at {}", source, path.display());

    let ledger = build_ledger_config(&config);
    eprintln!("\nLedger:");
    eprintln!("  initial cash:    {:.2}", ledger.initial_cash);
    eprintln!("  buy range:       {:.2} .. {:.2}", ledger.min_buy, ledger.max_buy);
    eprintln!("  transaction fee: {:.2}", ledger.transaction_fee);
    eprintln!("  tax rate:        {:.2}", ledger.tax_rate);

    let strategy = config
        .get_string("simulation", "strategy")
        .and_then(|s| s.parse::<StrategyKind>().ok())
        .unwrap_or_default();
    eprintln!("\nStrategy: {}", strategy);
    match config.get_list("simulation", "symbols") {
        Some(symbols) => eprintln!("Symbols:  {}", symbols.join(", ")),
        None => eprintln!("Symbols:  none configured"),
    }

    eprintln!("\nConfiguration is valid.");
    Ok(())
}
