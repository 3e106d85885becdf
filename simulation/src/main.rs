//! Vehicular NDN forwarding simulator
//!
//! Runs the reference scenarios or a highway of vehicles under any strategy
//! and prints a summary or a JSON report.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use vanet_core::NodeId;
use vanet_logging::{FileConfig, LogConfig, SubscriberBuilder};
use vanet_simulation::{SimConfig, SimReport, scenarios};
use vanet_strategy::StrategyKind;

#[derive(Parser)]
#[command(
    name = "vanet-sim",
    about = "NDN forwarding strategies for vehicular ad-hoc networks",
    version
)]
struct Cli {
    /// Log every forwarding decision
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the full report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Also write a JSONL decision trace to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one of the reference scenarios
    Scenario {
        #[arg(value_enum)]
        which: ScenarioName,
    },

    /// Run a highway of vehicles under one strategy
    Run {
        /// Strategy kind, e.g. DASB, LISIC or MINE2
        #[arg(short, long, default_value = "DASB")]
        strategy: StrategyKind,

        /// Number of vehicles
        #[arg(short, long, default_value = "8")]
        nodes: usize,

        /// Initial gap between vehicles, in metres
        #[arg(long, default_value = "80")]
        spacing: f64,

        /// Mean speed, in m/s
        #[arg(long, default_value = "20")]
        speed: f64,

        /// Simulated seconds
        #[arg(short, long, default_value = "10")]
        duration: f64,

        /// Radio range override, in metres
        #[arg(long)]
        range: Option<f64>,

        /// Consumer request rate, in Interests per second
        #[arg(long, default_value = "2")]
        rate: f64,

        /// Seed for nonces and jitter
        #[arg(long, default_value = "1")]
        seed: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScenarioName {
    A,
    B,
    C,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.verbose {
        LogConfig::development()
    } else {
        LogConfig::default()
    };
    let mut builder = SubscriberBuilder::new().with_config(config);
    if let Some(directory) = cli.log_dir.clone() {
        builder = builder.with_file_output(FileConfig {
            directory,
            ..FileConfig::default()
        });
    }
    let _guard = builder.init()?;

    let report = match cli.command {
        Commands::Scenario { which } => match which {
            ScenarioName::A => scenarios::run_scenario_a()?,
            ScenarioName::B => scenarios::run_scenario_b()?,
            ScenarioName::C => {
                let report = scenarios::run_scenario_c()?;
                let link_delay = SimConfig::scenario_c().link_delay;
                if let Some(measured) =
                    scenarios::interest_deferral(&report, NodeId(0), NodeId(1), link_delay)
                {
                    println!(
                        "Deferral at node 1: {:.6} s (formula {:.6} s)",
                        measured,
                        scenarios::scenario_c_expected_delay().as_secs_f64()
                    );
                }
                report
            }
        },
        Commands::Run {
            strategy,
            nodes,
            spacing,
            speed,
            duration,
            range,
            rate,
            seed,
        } => {
            let config = SimConfig {
                spacing,
                speed,
                duration: Duration::try_from_secs_f64(duration).unwrap_or(Duration::ZERO),
                radio_range: range,
                request_rate: rate,
                seed,
                ..SimConfig::highway(strategy, nodes)
            };
            scenarios::run("highway", config)?
        }
    };

    print_report(&report, cli.json)
}

fn print_report(report: &SimReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.summary());
    }
    Ok(())
}
