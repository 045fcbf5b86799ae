use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use rusty_econ::analysis::outliers::OutlierStrategy;
use rusty_econ::analysis::periodicity::Period;
use rusty_econ::bridge::{CancellationToken, ProcessBridge};
use rusty_econ::data::filter::unique_values;
use rusty_econ::data::loader::load_file;
use rusty_econ::state::run_analysis;
use rusty_econ::{apply, Operation, PipelineConfig, PipelineState};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliStrategy {
    /// Replace outliers with the series median
    Winsorize,
    /// Replace outliers with the mean of their neighbours
    Interpolate,
}

impl From<CliStrategy> for OutlierStrategy {
    fn from(cli: CliStrategy) -> Self {
        match cli {
            CliStrategy::Winsorize => OutlierStrategy::Winsorize,
            CliStrategy::Interpolate => OutlierStrategy::Interpolate,
        }
    }
}

/// Prepare time series from a table and run the econometric analysis.
#[derive(Debug, Parser)]
#[command(name = "rusty-econ", version, about)]
struct Args {
    /// Input table (.csv or .json)
    #[arg(short, long)]
    input: PathBuf,

    /// Pipeline settings (JSON); flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Column used to filter rows, e.g. `country`
    #[arg(long, requires = "filter_value")]
    filter_column: Option<String>,

    /// Value the filter column must equal
    #[arg(long, requires = "filter_column")]
    filter_value: Option<String>,

    /// Columns to analyse (default: every numeric column)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Dependent variable
    #[arg(short, long)]
    target: String,

    /// Seasonal period, or `auto`
    #[arg(long)]
    period: Option<Period>,

    #[arg(long, value_enum)]
    strategy: Option<CliStrategy>,

    #[arg(long)]
    vif_threshold: Option<f64>,

    /// Directory holding `python_runtime/` or `python_engine/`
    #[arg(long)]
    engine_root: Option<PathBuf>,

    /// Engine timeout; 0 waits forever
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print the engine request instead of running the engine
    #[arg(long)]
    dry_run: bool,
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(period) = args.period {
        config.period = period;
    }
    if let Some(strategy) = args.strategy {
        config.outlier_strategy = strategy.into();
    }
    if let Some(threshold) = args.vif_threshold {
        config.vif_threshold = threshold;
    }
    if let Some(root) = &args.engine_root {
        config.bridge.project_root = Some(root.clone());
    }
    if let Some(secs) = args.timeout_secs {
        config.bridge.timeout_secs = (secs > 0).then_some(secs);
    }
    Ok(config)
}

fn column(state: &PipelineState, name: &str) -> Result<usize> {
    state
        .dataset()
        .and_then(|ds| ds.column_index(name))
        .with_context(|| format!("no column named '{name}'"))
}

/// Column indices for `names`, each once even if named twice.
fn requested_columns(state: &PipelineState, names: &[String]) -> Result<BTreeSet<usize>> {
    names.iter().map(|name| column(state, name.trim())).collect()
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;

    let dataset = load_file(&args.input)
        .with_context(|| format!("loading {}", args.input.display()))?;
    let mut state = apply(&PipelineState::new(), Operation::LoadDataset(dataset), &config)?;

    if let (Some(name), Some(value)) = (&args.filter_column, &args.filter_value) {
        let col = column(&state, name)?;
        if let Some(ds) = state.dataset() {
            info!("values of '{name}': {:?}", unique_values(ds, col));
        }
        state = apply(
            &state,
            Operation::FilterRows {
                column: col,
                value: value.clone(),
            },
            &config,
        )?;
    }

    if args.columns.is_empty() {
        state = apply(&state, Operation::SelectAll, &config)?;
    } else {
        for col in requested_columns(&state, &args.columns)? {
            if !state.selection().contains(&col) {
                state = apply(&state, Operation::ToggleColumn(col), &config)?;
            }
        }
    }
    let target = column(&state, &args.target)?;
    if !state.selection().contains(&target) {
        state = apply(&state, Operation::ToggleColumn(target), &config)?;
    }

    for op in [
        Operation::Interpolate,
        Operation::TestNormality,
        Operation::Decompose {
            period: config.period,
        },
        Operation::HandleOutliers {
            strategy: config.outlier_strategy,
        },
        Operation::ChooseTarget(target),
    ] {
        state = apply(&state, op, &config)?;
    }

    if state.selection().len() > 2 {
        state = apply(
            &state,
            Operation::ReduceVif {
                threshold: config.vif_threshold,
            },
            &config,
        )?;
    } else {
        info!("fewer than two predictors, skipping VIF pruning");
    }

    if !state.column_errors().is_empty() {
        warn!("{} column failure(s) during preparation", state.column_errors().len());
    }

    if args.dry_run {
        let request = state.build_request()?;
        println!("{}", serde_json::to_string_pretty(&request)?);
        return Ok(());
    }

    let bridge = ProcessBridge::discover(&config.bridge).context("locating analysis engine")?;
    let result =
        run_analysis(&state, &bridge, &CancellationToken::new()).context("analysis failed")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
