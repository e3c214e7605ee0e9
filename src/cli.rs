//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::adapters::csv_data::CsvDataAdapter;
use crate::adapters::file_config::FileConfigAdapter;
use crate::adapters::memory_cache::MemoryCacheStore;
use crate::domain::backtest::{self, BacktestConfig};
use crate::domain::cache::IndicatorCache;
use crate::domain::error::QuantbackError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::optimizer::{
    self, MetricKind, OptimizationConfig, OptimizeTarget, ParamRange,
};
use crate::domain::strategy::Strategy;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::HistoricalDataProvider;

#[derive(Parser, Debug)]
#[command(name = "quantback", about = "Trading strategy backtest engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy definition (JSON)
        #[arg(short, long)]
        strategy: PathBuf,
        /// Write the result as JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Sweep one strategy parameter and report the best configuration
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a strategy definition
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            output,
        } => run_backtest(&config, &strategy, output.as_ref()),
        Command::Optimize {
            config,
            strategy,
            output,
        } => run_optimize(&config, &strategy, output.as_ref()),
        Command::Validate { strategy } => run_validate(&strategy),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

pub fn load_strategy(path: &PathBuf) -> Result<Strategy, ExitCode> {
    let content = fs::read_to_string(path).map_err(|e| {
        let err = QuantbackError::Io {
            reason: format!("failed to read {}: {}", path.display(), e),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })?;
    let strategy: Strategy = serde_json::from_str(&content).map_err(|e| {
        let err = QuantbackError::Validation {
            reason: format!("invalid strategy file {}: {}", path.display(), e),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })?;
    strategy.validate().map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    Ok(strategy)
}

fn run_backtest(
    config_path: &PathBuf,
    strategy_path: &PathBuf,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: Load config and strategy
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let strategy = match load_strategy(strategy_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    eprintln!("Loaded strategy: {}", strategy.name);

    // Stage 2: Fetch historical data
    let bars = match fetch_bars(&adapter, &strategy) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!(
        "Fetched {} bars for {} ({})",
        bars.len(),
        strategy.asset_symbol,
        strategy.time_frame
    );

    // Stage 3: Run
    let bt_config = build_backtest_config(&adapter);
    let cache = IndicatorCache::new(Arc::new(MemoryCacheStore::new()));
    let result = match backtest::run_backtest(&strategy, &bars, &bt_config, &cache) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!(
        "Backtest complete: {} trades, net profit {:.2}, win rate {:.1}%",
        result.performance_metrics.total_trades,
        result.performance_metrics.net_profit,
        result.performance_metrics.win_rate
    );

    write_json(&result, output_path)
}

fn run_optimize(
    config_path: &PathBuf,
    strategy_path: &PathBuf,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let strategy = match load_strategy(strategy_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let opt_config = match build_optimization_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let bars = match fetch_bars(&adapter, &strategy) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let bt_config = build_backtest_config(&adapter);
    // Shared across candidates so each indicator variant computes once.
    let cache = IndicatorCache::new(Arc::new(MemoryCacheStore::new()));
    let cancel = AtomicBool::new(false);

    let best = match optimizer::optimize(&strategy, &bars, &opt_config, &bt_config, &cache, &cancel)
    {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    match best {
        Some(found) => {
            eprintln!(
                "Best configuration: parameter value {} (metric {:.4})",
                found.parameter_value, found.metric_value
            );
            write_json(&found, output_path)
        }
        None => {
            eprintln!("No improvement found: every candidate failed");
            ExitCode::SUCCESS
        }
    }
}

fn run_validate(strategy_path: &PathBuf) -> ExitCode {
    match load_strategy(strategy_path) {
        Ok(strategy) => {
            eprintln!(
                "Strategy {} is valid: {} indicators, {} entry rules, {} exit rules",
                strategy.name,
                strategy.indicators.len(),
                strategy.entry_rules.len(),
                strategy.exit_rules.len()
            );
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

fn fetch_bars(
    adapter: &dyn ConfigPort,
    strategy: &Strategy,
) -> Result<Vec<crate::domain::bar::Bar>, QuantbackError> {
    let base_path = adapter
        .get_string("data", "base_path")
        .ok_or_else(|| QuantbackError::ConfigMissing {
            section: "data".into(),
            key: "base_path".into(),
        })?;
    let start_time = parse_config_time(adapter, "start_time")?;
    let end_time = parse_config_time(adapter, "end_time")?;

    let provider = CsvDataAdapter::new(PathBuf::from(base_path));
    provider.fetch(
        &strategy.asset_symbol,
        &strategy.time_frame,
        start_time,
        end_time,
    )
}

fn parse_config_time(adapter: &dyn ConfigPort, key: &str) -> Result<DateTime<Utc>, QuantbackError> {
    let value = adapter
        .get_string("data", key)
        .ok_or_else(|| QuantbackError::ConfigMissing {
            section: "data".into(),
            key: key.into(),
        })?;
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| QuantbackError::ConfigInvalid {
            section: "data".into(),
            key: key.into(),
            reason: "invalid timestamp (expected RFC 3339, e.g. 2024-01-01T00:00:00Z)".into(),
        })
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> BacktestConfig {
    let defaults = ExecutionConfig::default();
    BacktestConfig {
        execution: ExecutionConfig {
            slippage_pct: adapter.get_double("execution", "slippage_pct", defaults.slippage_pct),
            commission: adapter.get_double("execution", "commission", defaults.commission),
        },
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", 0.0),
    }
}

pub fn build_optimization_config(
    adapter: &dyn ConfigPort,
) -> Result<OptimizationConfig, QuantbackError> {
    let require = |key: &str| {
        adapter
            .get_string("optimizer", key)
            .ok_or_else(|| QuantbackError::ConfigMissing {
                section: "optimizer".into(),
                key: key.into(),
            })
    };
    let require_number = |key: &str| -> Result<f64, QuantbackError> {
        require(key)?
            .parse()
            .map_err(|_| QuantbackError::ConfigInvalid {
                section: "optimizer".into(),
                key: key.into(),
                reason: "expected a number".into(),
            })
    };

    let target = match require("target")?.as_str() {
        "leverage" => OptimizeTarget::Leverage,
        "indicator" => OptimizeTarget::IndicatorParam {
            indicator: require("indicator")?,
            parameter: require("parameter")?,
        },
        other => {
            return Err(QuantbackError::ConfigInvalid {
                section: "optimizer".into(),
                key: "target".into(),
                reason: format!("unknown target {other:?} (expected leverage or indicator)"),
            })
        }
    };

    let metric = match require("metric")?.as_str() {
        "net_profit" => MetricKind::NetProfit,
        "win_rate" => MetricKind::WinRate,
        "sharpe_ratio" => MetricKind::SharpeRatio,
        "compared_to_buy_and_hold" => MetricKind::ComparedToBuyAndHold,
        other => {
            return Err(QuantbackError::ConfigInvalid {
                section: "optimizer".into(),
                key: "metric".into(),
                reason: format!("unknown metric {other:?}"),
            })
        }
    };

    Ok(OptimizationConfig {
        target,
        range: ParamRange {
            start: require_number("start")?,
            end: require_number("end")?,
        },
        step: require_number("step")?,
        metric,
        parallel: adapter.get_bool("optimizer", "parallel", true),
    })
}

fn write_json<T: serde::Serialize>(value: &T, output_path: Option<&PathBuf>) -> ExitCode {
    let json = match serde_json::to_string_pretty(value) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("error: failed to serialize result: {e}");
            return ExitCode::from(1);
        }
    };
    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(path, &json) {
                let err = QuantbackError::Io {
                    reason: format!("failed to write {}: {}", path.display(), e),
                };
                eprintln!("error: {err}");
                return ExitCode::from(&err);
            }
            eprintln!("Result written to {}", path.display());
            ExitCode::SUCCESS
        }
        None => {
            println!("{json}");
            ExitCode::SUCCESS
        }
    }
}
