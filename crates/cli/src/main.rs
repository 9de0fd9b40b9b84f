//! Bus arbiter simulator CLI.
//!
//! This binary provides a single entry point for all simulation modes. It performs:
//! 1. **Arbiter run:** Drive a traffic script through the arbiter into the behavioural memory.
//! 2. **Pin run:** Drive the same script through the pin transactor into a pin-level memory.
//! 3. **Config check:** Validate a JSON configuration and print the resolved parameters.
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use busarb_core::Config;
use busarb_core::common::{ConfigError, SimError, Time};
use busarb_core::sim::simulator::DEFAULT_STEP_LIMIT;
use busarb_core::sim::{PinSimulator, Simulator, TrafficMaster};

#[derive(Parser, Debug)]
#[command(
    name = "busarb",
    author,
    version,
    about = "Bus arbiter, width converter and pin transactor simulator",
    long_about = "Run a traffic script against the arbiter or the pin transactor.\n\nExamples:\n  busarb run -s traffic.txt\n  busarb run -c config.json -s traffic.txt -x dump_lock -x dump_profile_results\n  busarb pins -c config.json -s traffic.txt\n  busarb check -c config.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a traffic script through the arbiter.
    Run {
        /// JSON configuration (built-in defaults when omitted).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Traffic script.
        #[arg(short, long)]
        script: PathBuf,

        /// Stop before the first event later than this time.
        #[arg(long)]
        until: Option<Time>,

        /// Maximum number of simulation steps.
        #[arg(long, default_value_t = DEFAULT_STEP_LIMIT)]
        max_steps: u64,

        /// Runtime command executed after the run (repeatable).
        #[arg(short = 'x', long = "command")]
        commands: Vec<String>,

        /// Skip the statistics report.
        #[arg(long)]
        quiet: bool,
    },

    /// Run a traffic script through the pin transactor.
    Pins {
        /// JSON configuration (built-in defaults when omitted).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Traffic script.
        #[arg(short, long)]
        script: PathBuf,

        /// Maximum number of simulation steps.
        #[arg(long, default_value_t = DEFAULT_STEP_LIMIT)]
        max_steps: u64,
    },

    /// Validate a configuration and print it.
    Check {
        /// JSON configuration.
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            config,
            script,
            until,
            max_steps,
            commands,
            quiet,
        } => cmd_run(config.as_deref(), &script, until, max_steps, &commands, quiet),
        Commands::Pins {
            config,
            script,
            max_steps,
        } => cmd_pins(config.as_deref(), &script, max_steps),
        Commands::Check { config } => cmd_check(&config),
    };
    if let Err(e) = result {
        error!(error = %e, "simulation aborted");
        eprintln!("\n[!] {e}");
        process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    path.map_or_else(|| Ok(Config::default()), Config::from_file)
}

fn read_script(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn print_masters(masters: &[TrafficMaster]) {
    for master in masters {
        println!(
            "[port {}] accepted {} | responses {} | naccs {}",
            master.port(),
            master.accepted().len(),
            master.responses().len(),
            master.naccs()
        );
        for (at, response) in master.responses() {
            println!("  @{at:<10} {response}");
        }
    }
}

/// Runs the arbiter, then executes each runtime command and prints its output.
fn cmd_run(
    config: Option<&Path>,
    script: &Path,
    until: Option<Time>,
    max_steps: u64,
    commands: &[String],
    quiet: bool,
) -> Result<(), SimError> {
    let config = load_config(config)?;
    let mut sim = Simulator::new(&config)?;
    sim.load_script(&read_script(script)?)?;
    let end = sim.run(until, max_steps)?;

    println!("[*] Stopped at {end} after {} steps", sim.steps());
    print_masters(&sim.masters);
    for command in commands {
        println!("\n> {command}");
        print!("{}", sim.execute_line(command)?);
    }
    if !quiet {
        println!();
        sim.arbiter.stats().print(Some(&sim.arbiter.buffer_profile()));
    }
    Ok(())
}

fn cmd_pins(config: Option<&Path>, script: &Path, max_steps: u64) -> Result<(), SimError> {
    let config = load_config(config)?;
    let mut sim = PinSimulator::new(&config)?;
    sim.load_script(&read_script(script)?)?;
    let end = sim.run(max_steps)?;

    let stats = sim.transactor.stats();
    println!(
        "[*] {:?} pins stopped at {end}",
        sim.transactor.config().protocol
    );
    println!(
        "    queued {} | accepted {} | naccs {} | responses {} | discarded {}",
        stats.queued, stats.accepted, stats.naccs, stats.responses, stats.discarded
    );
    print_masters(&sim.masters);
    Ok(())
}

fn cmd_check(path: &Path) -> Result<(), SimError> {
    let config = Config::from_file(path)?;
    println!("[*] {} is valid", path.display());
    println!("{config:#?}");
    Ok(())
}
