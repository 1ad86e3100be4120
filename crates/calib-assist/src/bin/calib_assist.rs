use std::path::{Path, PathBuf};

use calib_assist::io::ReplayConfig;
use calib_assist::replay::run_replay;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "calib-assist", version, about = "Assisted camera calibration tools")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON logs (requires the `tracing` feature).
    #[arg(long, global = true)]
    json_log: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a recorded session and write a JSON report.
    Replay {
        /// Replay config (JSON).
        config: PathBuf,
        /// Override the report path from the config.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a default replay config.
    DefaultConfig {
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Io(#[from] calib_assist::io::ReplayIoError),
    #[error(transparent)]
    Replay(#[from] calib_assist::replay::ReplayError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_log);

    if let Err(err) = run(cli.command) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_verbose: u8, json: bool) {
    calib_assist::core::init_tracing(json);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: u8, json: bool) {
    if json {
        eprintln!("--json-log needs the `tracing` feature; using plain logs");
    }
    let level = calib_assist::core::level_from_verbosity(verbose);
    if let Err(err) = calib_assist::core::init_with_level(level) {
        eprintln!("failed to initialize logger: {err}");
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Replay { config, output } => {
            let cfg = ReplayConfig::load_json(&config)?;
            let base_dir = config.parent().unwrap_or(Path::new("."));
            let report = run_replay(&cfg, base_dir)?;

            let out = output.unwrap_or_else(|| base_dir.join(cfg.output_path()));
            report.write_json(&out)?;
            println!(
                "{} captures, phase {:?}, score {:.3}; wrote report to {}",
                report.captures.len(),
                report.phase,
                report.final_score,
                out.display()
            );
        }
        Command::DefaultConfig { output } => {
            let cfg = ReplayConfig::default();
            match output {
                Some(path) => {
                    cfg.write_json(&path)?;
                    println!("wrote {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&cfg)?),
            }
        }
    }
    Ok(())
}
