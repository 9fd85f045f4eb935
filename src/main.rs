//! botlift - bot detection and outcome scoring CLI
//!
//! Usage:
//!   botlift train --data snapshot.json          # Train and report on a snapshot
//!   botlift train --synthetic-nodes 500 --json  # Synthetic data, JSON lines output
//!   botlift train --config run.toml --epochs 20 # Config file plus overrides
//!   botlift edges --data snapshot.json          # Rank edges by relevance

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use botlift::autograd::Tensor;
use botlift::config::PipelineConfig;
use botlift::data::{out_degree_features, GraphSample, MaskKind, Snapshot, SyntheticConfig};
use botlift::model::EdgeRelevanceEncoder;
use botlift::nn::Module;
use botlift::threshold::ThresholdScope;
use botlift::train::{EvalSnapshot, FinalEvaluation, TaskEvaluation, Trainer};
use botlift::{BotliftError, Result};

/// botlift - joint bot detection and treatment-aware outcome scoring
#[derive(Parser)]
#[command(name = "botlift")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the dual-score GCN and print classification reports
    Train {
        /// JSON snapshot with edges, bot labels, treatment and outcome
        #[arg(long, value_name = "FILE", conflicts_with = "synthetic_nodes")]
        data: Option<PathBuf>,

        /// Generate a synthetic snapshot with this many nodes instead
        #[arg(long, value_name = "N")]
        synthetic_nodes: Option<usize>,

        /// TOML pipeline configuration
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the number of epochs
        #[arg(long)]
        epochs: Option<usize>,

        /// Mask for the final outcome report
        #[arg(long, value_enum)]
        final_eval_mask: Option<MaskArg>,

        /// Scores the quantile thresholds are fitted on
        #[arg(long, value_enum)]
        threshold_scope: Option<ScopeArg>,

        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Split edges into homophilous and heterophilous sets
    Edges {
        /// JSON snapshot with edges, bot labels, treatment and outcome
        #[arg(long, value_name = "FILE", conflicts_with = "synthetic_nodes")]
        data: Option<PathBuf>,

        /// Generate a synthetic snapshot with this many nodes instead
        #[arg(long, value_name = "N")]
        synthetic_nodes: Option<usize>,

        /// Random seed
        #[arg(long, default_value_t = 101)]
        seed: u64,

        /// Hidden width of the encoder
        #[arg(long, default_value_t = 16)]
        hidden: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MaskArg {
    Train,
    Test,
}

impl From<MaskArg> for MaskKind {
    fn from(arg: MaskArg) -> Self {
        match arg {
            MaskArg::Train => MaskKind::Train,
            MaskArg::Test => MaskKind::Test,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Global,
    Masked,
}

impl From<ScopeArg> for ThresholdScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Global => ThresholdScope::Global,
            ScopeArg::Masked => ThresholdScope::Masked,
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: logging unavailable: {e}");
    }
}

fn load_snapshot(
    data: Option<&Path>,
    synthetic_nodes: Option<usize>,
    rng: &mut StdRng,
) -> Result<Snapshot> {
    match (data, synthetic_nodes) {
        (Some(path), _) => Snapshot::from_file(path),
        (None, Some(n)) => Snapshot::synthetic(&SyntheticConfig::with_nodes(n), rng),
        (None, None) => Snapshot::synthetic(&SyntheticConfig::default(), rng),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn print_task(title: &str, task: &TaskEvaluation) {
    println!(
        "{title} ({} nodes, threshold {:.4})",
        task.mask, task.threshold
    );
    println!("{}", task.report);
}

fn print_snapshot(snapshot: &EvalSnapshot) {
    println!("== epoch {} ==", snapshot.epoch);
    print_task("bot", &snapshot.bot);
    print_task("outcome", &snapshot.outcome);
    let fmt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"));
    println!(
        "uplift: observed {}, predicted {}",
        fmt(snapshot.observed_uplift),
        fmt(snapshot.predicted_uplift)
    );
    println!();
}

#[derive(Serialize)]
struct Tagged<'a, T> {
    kind: &'a str,
    #[serde(flatten)]
    value: &'a T,
}

#[allow(clippy::too_many_arguments)]
fn run_train(
    data: Option<&Path>,
    synthetic_nodes: Option<usize>,
    config_path: Option<&Path>,
    seed: Option<u64>,
    epochs: Option<usize>,
    final_eval_mask: Option<MaskArg>,
    threshold_scope: Option<ScopeArg>,
    json: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(seed) = seed {
        config.data.seed = seed;
    }
    if let Some(epochs) = epochs {
        config.training.epochs = epochs;
    }
    if let Some(mask) = final_eval_mask {
        config.evaluation.final_eval_mask = mask.into();
    }
    if let Some(scope) = threshold_scope {
        config.evaluation.threshold_scope = scope.into();
    }
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.data.seed);
    let snapshot = load_snapshot(data, synthetic_nodes, &mut rng)?;
    let sample = GraphSample::from_snapshot(&snapshot, config.data.train_fraction, &mut rng)?;
    info!(
        nodes = sample.num_nodes(),
        edges = sample.num_edges(),
        seed = config.data.seed,
        "loaded graph"
    );

    let mut trainer = Trainer::new(sample, config)?;
    let mut output: Result<()> = Ok(());
    trainer.fit_with(|snapshot| {
        if json {
            if output.is_ok() {
                output = print_json(&Tagged {
                    kind: "evaluation",
                    value: snapshot,
                });
            }
        } else {
            print_snapshot(snapshot);
        }
    })?;
    output?;

    let final_eval: FinalEvaluation = trainer.evaluate()?;
    if json {
        print_json(&Tagged {
            kind: "final",
            value: &final_eval,
        })?;
    } else {
        println!("== final ==");
        print_task("bot", &final_eval.bot);
        print_task("outcome", &final_eval.outcome);
    }
    Ok(())
}

fn run_edges(
    data: Option<&Path>,
    synthetic_nodes: Option<usize>,
    seed: u64,
    hidden: usize,
    json: bool,
) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let snapshot = load_snapshot(data, synthetic_nodes, &mut rng)?;

    let num_nodes = snapshot.num_nodes();
    let edges = snapshot.edge_list();
    let x = Tensor::new(&out_degree_features(num_nodes, &edges), &[num_nodes, 1]);

    let mut encoder = EdgeRelevanceEncoder::with_defaults(1, hidden, &mut rng)?;
    encoder.eval();
    let split = encoder.split(&x, &edges)?;
    info!(
        edges = edges.len(),
        k = split.homophilous.len(),
        "edge split"
    );

    if json {
        return print_json(&split);
    }
    println!("homophilous ({}):", split.homophilous.len());
    for (s, t) in &split.homophilous {
        println!("  {s} -> {t}");
    }
    println!("heterophilous ({}):", split.heterophilous.len());
    for (s, t) in &split.heterophilous {
        println!("  {s} -> {t}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Train {
            data,
            synthetic_nodes,
            config,
            seed,
            epochs,
            final_eval_mask,
            threshold_scope,
            json,
        } => run_train(
            data.as_deref(),
            synthetic_nodes,
            config.as_deref(),
            seed,
            epochs,
            final_eval_mask,
            threshold_scope,
            json,
        ),

        Commands::Edges {
            data,
            synthetic_nodes,
            seed,
            hidden,
            json,
        } => run_edges(data.as_deref(), synthetic_nodes, seed, hidden, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(&e),
    }
}

fn report_error(e: &BotliftError) -> ExitCode {
    eprintln!("error: {e}");
    ExitCode::from(e.exit_code())
}
