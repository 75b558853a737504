//! RegimeLab CLI — run, walk-forward and Monte-Carlo commands.
//!
//! Commands:
//! - `run` — one simulation from a TOML run file; writes run artifacts
//! - `walk-forward` — rolling or anchored train/test validation over a grid
//! - `monte-carlo` — resample a finished run and report ruin probability
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use regimelab_core::regime::MarketRegime;
use regimelab_runner::{
    load_features, run_file, run_monte_carlo, run_walk_forward, ArtifactManager, FitnessMetric,
    LoadedData, MonteCarloResult, Percentiles, ResampleSource, RunFile,
    SimulationResult, WalkForwardResult,
};

#[derive(Parser)]
#[command(
    name = "regimelab",
    version,
    about = "RegimeLab CLI — regime-gated portfolio simulation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation from a TOML run file.
    Run {
        /// Path to the run file.
        #[arg(long)]
        config: PathBuf,

        /// Fall back to synthetic bars for symbols without a CSV file.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Walk-forward validation using the run file's `[walk_forward]` section.
    WalkForward {
        #[arg(long)]
        config: PathBuf,

        /// Override the fitness metric (sharpe, sortino, calmar, total-return, ...).
        #[arg(long)]
        fitness: Option<FitnessMetric>,

        #[arg(long, default_value_t = false)]
        synthetic: bool,

        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Run once, then resample the result into Monte-Carlo paths.
    MonteCarlo {
        #[arg(long)]
        config: PathBuf,

        /// Number of resampled paths. Overrides `[monte_carlo] n_paths`.
        #[arg(long)]
        paths: Option<usize>,

        /// Master seed. Overrides `[monte_carlo] seed`.
        #[arg(long)]
        seed: Option<u64>,

        /// What to resample.
        #[arg(long, value_enum)]
        source: Option<SourceArg>,

        #[arg(long, default_value_t = false)]
        synthetic: bool,

        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Trades,
    DailyReturns,
}

impl From<SourceArg> for ResampleSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Trades => ResampleSource::Trades,
            SourceArg::DailyReturns => ResampleSource::DailyReturns,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            synthetic,
            output_dir,
        } => run_cmd(config, synthetic, output_dir),
        Commands::WalkForward {
            config,
            fitness,
            synthetic,
            output_dir,
        } => walk_forward_cmd(config, fitness, synthetic, output_dir),
        Commands::MonteCarlo {
            config,
            paths,
            seed,
            source,
            synthetic,
            output_dir,
        } => monte_carlo_cmd(config, paths, seed, source, synthetic, output_dir),
    }
}

fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_run_file(path: &Path, synthetic: bool) -> Result<RunFile> {
    let mut file = RunFile::from_file(path)
        .with_context(|| format!("failed to load run file {}", path.display()))?;
    if synthetic {
        file.data.synthetic = true;
    }
    Ok(file)
}

fn run_cmd(config: PathBuf, synthetic: bool, output_dir: PathBuf) -> Result<()> {
    let file = load_run_file(&config, synthetic)?;
    let (result, loaded) = run_file(&file)?;

    print_summary(&result, &loaded);

    let manager = ArtifactManager::new(&output_dir)?;
    let paths = manager.save_run(&result)?;
    println!("Artifacts saved to: {}", paths.run_dir.display());
    Ok(())
}

fn walk_forward_cmd(
    config: PathBuf,
    fitness: Option<FitnessMetric>,
    synthetic: bool,
    output_dir: PathBuf,
) -> Result<()> {
    let file = load_run_file(&config, synthetic)?;
    let Some(mut wf) = file.walk_forward.clone() else {
        bail!(
            "run file {} has no [walk_forward] section",
            config.display()
        );
    };
    if let Some(metric) = fitness {
        wf.fitness = metric;
    }

    let base = file.simulation_config()?;
    let loaded = load_features(
        &file.symbols(),
        &file.data.benchmark,
        &file.data.features,
        &file.load_options(),
    )?;
    let report = run_walk_forward(&base, &loaded.features, &wf)?;
    print_walk_forward(&report);

    // Full-range run for the artifact directory the report lives beside
    let (result, _) = run_file(&file)?;
    let manager = ArtifactManager::new(&output_dir)?;
    manager.save_run(&result)?;
    let path = manager.save_report(&result, "walk_forward", &report)?;
    println!("Report saved to: {}", path.display());
    Ok(())
}

fn monte_carlo_cmd(
    config: PathBuf,
    paths: Option<usize>,
    seed: Option<u64>,
    source: Option<SourceArg>,
    synthetic: bool,
    output_dir: PathBuf,
) -> Result<()> {
    let file = load_run_file(&config, synthetic)?;
    let mut mc = file.monte_carlo.clone().unwrap_or_default();
    if let Some(n) = paths {
        mc.n_paths = n;
    }
    if let Some(s) = seed {
        mc.seed = s;
    }
    if let Some(src) = source {
        mc.source = src.into();
    }

    let (result, loaded) = run_file(&file)?;
    print_summary(&result, &loaded);
    let report = run_monte_carlo(&result, &mc)?;
    print_monte_carlo(&report);

    let manager = ArtifactManager::new(&output_dir)?;
    manager.save_run(&result)?;
    let path = manager.save_report(&result, "monte_carlo", &report)?;
    println!("Report saved to: {}", path.display());
    Ok(())
}

fn print_summary(result: &SimulationResult, loaded: &LoadedData) {
    let config = &result.config;
    let m = &result.metrics;
    println!();
    println!("=== Simulation Result ===");
    println!("Run:            {}", result.run_id.short());
    println!("Strategy:       {}", config.strategy().as_str());
    println!("Universe:       {}", config.universe().join(", "));
    println!("Period:         {} to {}", config.start(), config.end());
    println!("Days:           {}", result.equity_curve.len());
    println!("Dataset:        {}", loaded.dataset_hash.0);
    println!("Trades:         {} closed, {} open", m.num_trades, result.final_state.holdings.len());
    println!("Skipped:        {}", result.events.len());
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", result.final_equity());
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("CAGR:           {:.2}%", m.cagr * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Sortino:        {:.3}", m.sortino);
    println!("Calmar:         {:.3}", m.calmar);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Ulcer Index:    {:.2}", m.ulcer_index);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Expectancy:     {:.2}", m.expectancy);
    if let Some(history) = &result.regime_history {
        let bull = history
            .iter()
            .filter(|p| p.regime == MarketRegime::Bull)
            .count();
        println!("Bull Days:      {bull}/{}", history.len());
    }
    if result.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}

fn print_walk_forward(report: &WalkForwardResult) {
    println!();
    println!("=== Walk-Forward ({}) ===", report.fitness);
    println!(
        "{:<5} {:<23} {:<23} {:>10} {:>10} {:>9}",
        "Fold", "Train", "Test", "IS", "OOS", "OOS Ret"
    );
    println!("{}", "-".repeat(85));
    for f in &report.fold_results {
        println!(
            "{:<5} {:<23} {:<23} {:>10.3} {:>10.3} {:>8.2}%",
            f.fold_index,
            format!("{}..{}", f.train_start, f.train_end),
            format!("{}..{}", f.test_start, f.test_end),
            f.is_fitness,
            f.oos_fitness,
            f.oos_return * 100.0
        );
    }
    println!();
    println!("Mean IS:        {:.3}", report.mean_is_fitness);
    println!("Mean OOS:       {:.3}", report.mean_oos_fitness);
    match report.degradation_ratio {
        Some(ratio) => println!("Degradation:    {ratio:.3} ({:?})", report.degradation_flag),
        None => println!("Degradation:    n/a ({:?})", report.degradation_flag),
    }
    println!("Stitched OOS:   {:.2}%", report.stitched_oos_return * 100.0);
    println!();
}

fn print_monte_carlo(report: &MonteCarloResult) {
    let row = |label: &str, p: &Percentiles, scale: f64| {
        println!(
            "{label:<14} {:>12.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
            p.p05 * scale,
            p.p25 * scale,
            p.p50 * scale,
            p.p75 * scale,
            p.p95 * scale
        );
    };
    println!("=== Monte Carlo ({} paths, {:?}) ===", report.n_paths, report.source);
    println!(
        "{:<14} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "", "P05", "P25", "P50", "P75", "P95"
    );
    row("Final Equity", &report.final_equity, 1.0);
    row("Sharpe", &report.sharpe, 1.0);
    row("Max DD %", &report.max_drawdown, 100.0);
    println!();
    println!(
        "P(ruin):        {:.2}% (equity below {:.2})",
        report.probability_of_ruin * 100.0,
        report.ruin_level
    );
    println!();
}
