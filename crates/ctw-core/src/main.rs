//! ctw - context-tree weighting over bit strings
//!
//! The main entry point, handling:
//! - Greedy continuation of a bit string
//! - Per-line code length of a file of bit strings
//! - Context selection on step-structured histories
//! - Byte <-> bit conversion

use clap::{Args, Parser, Subcommand};
use ctw_common::{format_bits, parse_bits, to_bits, to_bytes, Bit};
use ctw_core::config::{load_config, ConfigOptions, ModelConfig};
use ctw_core::exit_codes::ExitCode;
use ctw_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use ctw_core::{
    continue_greedy, cost_bits, model_from_trees, replay_steps, select_trees, train, BitModel,
    FactoredModel, Historian, MissingContext, Var,
};
use ctw_math::Estimator;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

/// Context-tree weighting: predict, score and model bit strings
#[derive(Parser)]
#[command(name = "ctw")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Model configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Prefix human-readable log lines with timestamps
    #[arg(long, global = true)]
    log_timestamps: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Continue a bit string with the most likely bits
    Continue(ContinueArgs),

    /// Estimate the bits needed to compress each line of a file
    Cost(CostArgs),

    /// Select context variables for a step-structured history
    Select(SelectArgs),

    /// Print the bits of a text, 8 per byte, most significant first
    Bits(BitsArgs),

    /// Pack a bit string into bytes and write them to stdout
    Bytes(BytesArgs),
}

// ============================================================================
// Command argument structs
// ============================================================================

/// Overrides of the resolved model configuration.
#[derive(Args, Debug)]
struct ModelArgs {
    /// Assume deterministic sequence generator models
    #[arg(short, long)]
    deterministic: bool,

    /// Limit the depth of the context tree
    #[arg(long)]
    depth: Option<usize>,
}

#[derive(Args, Debug)]
struct ContinueArgs {
    /// Sequence of 0s and 1s
    bits: String,

    /// Number of bits to predict
    #[arg(short = 'n', default_value = "10")]
    num_predicted_bits: usize,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args, Debug)]
struct CostArgs {
    /// File with one bit string per line
    path: PathBuf,

    /// Train one model across all lines instead of a fresh model per line
    #[arg(long)]
    shared: bool,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args, Debug)]
struct SelectArgs {
    /// History of whole steps
    bits: String,

    /// Generated bits per step
    #[arg(long, short = 'g')]
    generated: usize,

    /// Added bits per step
    #[arg(long, short = 'a', default_value = "0")]
    added: usize,

    /// Select one tree per generated offset
    #[arg(long)]
    factored: bool,

    /// Furthest offset to consider (negative)
    #[arg(long, allow_negative_numbers = true)]
    min_var_index: Option<isize>,

    /// Deepest level of selected variables, counted from 0
    #[arg(long)]
    selection_depth: Option<usize>,

    /// Policy for offsets before the start of history
    #[arg(long)]
    missing_context: Option<MissingContext>,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args, Debug)]
struct BitsArgs {
    text: String,
}

#[derive(Args, Debug)]
struct BytesArgs {
    bits: String,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            let _ = err.print();
            std::process::exit(code.as_i32());
        }
    };

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else if cli.global.verbose > 0 {
        let mut level = LogLevel::Warn;
        for _ in 0..cli.global.verbose {
            level = level.louder();
        }
        Some(level)
    } else {
        None
    };
    let mut log_config = LogConfig::from_env();
    if let Some(level) = cli_level {
        log_config = log_config.with_level(level);
    }
    if let Some(format) = cli.global.log_format {
        log_config = log_config.with_format(format);
    }
    if cli.global.log_timestamps {
        log_config = log_config.with_timestamps(true);
    }
    init_logging(&log_config);

    let exit_code = match &cli.command {
        Commands::Continue(args) => run_continue(&cli.global, args),
        Commands::Cost(args) => run_cost(&cli.global, args),
        Commands::Select(args) => run_select(&cli.global, args),
        Commands::Bits(args) => run_bits(args),
        Commands::Bytes(args) => run_bytes(args),
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Helpers
// ============================================================================

fn report(err: &ctw_common::Error) -> ExitCode {
    eprintln!("ctw: {err}");
    eprintln!("hint: {}", err.remediation());
    ExitCode::from(err)
}

/// Resolves the model configuration and applies command-line overrides.
fn resolve_model(global: &GlobalOpts, args: &ModelArgs) -> Result<ModelConfig, ExitCode> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
    };
    let resolved = load_config(&options).map_err(|err| {
        eprintln!("ctw: {err}");
        ExitCode::from(&err)
    })?;
    if let Some(path) = &resolved.path {
        tracing::debug!(path = %path.display(), "loaded model configuration");
    }

    let mut model = resolved.model;
    if args.deterministic {
        model.estimator = Estimator::Deterministic;
    }
    if args.depth.is_some() {
        model.max_depth = args.depth;
    }
    Ok(model)
}

fn parse_arg_bits(text: &str) -> Result<Vec<Bit>, ExitCode> {
    parse_bits(text).map_err(|err| report(&err))
}

// ============================================================================
// Commands
// ============================================================================

fn run_continue(global: &GlobalOpts, args: &ContinueArgs) -> ExitCode {
    let config = match resolve_model(global, &args.model) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let bits = match parse_arg_bits(&args.bits) {
        Ok(bits) => bits,
        Err(code) => return code,
    };

    let result = config.build().and_then(|mut model| {
        model.observe_generated_all(&bits)?;
        continue_greedy(&mut model, args.num_predicted_bits)
    });
    let steps = match result {
        Ok(steps) => steps,
        Err(err) => return report(&err),
    };

    let continuation: Vec<Bit> = steps.iter().map(|(bit, _)| *bit).collect();
    let probability: f64 = steps.iter().map(|(_, p)| p).product();
    let factors: Vec<String> = steps.iter().map(|(_, p)| format!("{p:.2}")).collect();

    println!("{} -> {}", args.bits, format_bits(&continuation));
    println!("with P = {:.6} = {}", probability, factors.join(" * "));
    ExitCode::Clean
}

fn run_cost(global: &GlobalOpts, args: &CostArgs) -> ExitCode {
    let config = match resolve_model(global, &args.model) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let content = match std::fs::read_to_string(&args.path) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("ctw: cannot read {}", args.path.display());
            return report(&err.into());
        }
    };

    let mut shared: Option<FactoredModel> = None;
    let mut total_bits = 0.0;
    let mut n_seqs = 0usize;
    for (line_no, line) in content.lines().enumerate() {
        let bits = match parse_bits(line.trim_end()) {
            Ok(bits) => bits,
            Err(err) => {
                eprintln!("ctw: line {}: {err}", line_no + 1);
                return ExitCode::InputError;
            }
        };

        let cost = if args.shared {
            let model = match shared.take() {
                Some(model) => Ok(model),
                None => config.build(),
            };
            model.and_then(|mut model| {
                let summary = train(&mut model, [&bits])?;
                shared = Some(model);
                Ok(summary.cost_bits)
            })
        } else {
            config.build().and_then(|mut model| {
                model.observe_generated_all(&bits)?;
                Ok(cost_bits(model.history_log_probability()))
            })
        };
        let cost = match cost {
            Ok(cost) => cost,
            Err(err) => {
                eprintln!("ctw: line {}:", line_no + 1);
                return report(&err);
            }
        };

        total_bits += cost;
        n_seqs += 1;
        println!("{} {}", n_seqs, cost);
    }

    let avg = if n_seqs == 0 {
        0.0
    } else {
        total_bits / n_seqs as f64
    };
    println!("avg cost: {} bits", avg);
    ExitCode::Clean
}

#[derive(Serialize)]
struct SelectReport {
    factored: bool,
    steps: usize,
    trees: Vec<Option<Var>>,
    /// Code length of the history under the selected model.
    cost_bits: f64,
}

fn run_select(global: &GlobalOpts, args: &SelectArgs) -> ExitCode {
    let mut config = match resolve_model(global, &args.model) {
        Ok(config) => config,
        Err(code) => return code,
    };
    if args.min_var_index.is_some() {
        config.min_var_index = args.min_var_index;
    }
    if args.selection_depth.is_some() {
        config.selection_depth = args.selection_depth;
    }
    if let Some(policy) = args.missing_context {
        config.missing_context = policy;
    }
    if let Err(err) = config.validate() {
        eprintln!("ctw: {err}");
        return ExitCode::from(&err);
    }

    let bits = match parse_arg_bits(&args.bits) {
        Ok(bits) => bits,
        Err(code) => return code,
    };
    let historian = match Historian::new(bits, args.generated, args.added) {
        Ok(historian) => historian,
        Err(err) => return report(&err),
    };

    let trees = select_trees(&historian, &config, args.factored);
    let cost = model_from_trees(trees.clone(), &config).and_then(|mut model| {
        replay_steps(&mut model, &historian)?;
        Ok(cost_bits(model.history_log_probability()))
    });
    let cost = match cost {
        Ok(cost) => cost,
        Err(err) => return report(&err),
    };

    let report_json = SelectReport {
        factored: args.factored,
        steps: historian.num_steps(),
        trees,
        cost_bits: cost,
    };
    match serde_json::to_string_pretty(&report_json) {
        Ok(json) => {
            println!("{json}");
            ExitCode::Clean
        }
        Err(err) => report(&err.into()),
    }
}

fn run_bits(args: &BitsArgs) -> ExitCode {
    println!("{}", format_bits(&to_bits(args.text.as_bytes())));
    ExitCode::Clean
}

fn run_bytes(args: &BytesArgs) -> ExitCode {
    let bits = match parse_arg_bits(&args.bits) {
        Ok(bits) => bits,
        Err(code) => return code,
    };
    let bytes = match to_bytes(&bits) {
        Ok(bytes) => bytes,
        Err(err) => return report(&err),
    };
    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&bytes).and_then(|()| stdout.flush()) {
        Ok(()) => ExitCode::Clean,
        Err(err) => report(&err.into()),
    }
}
