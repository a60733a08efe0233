mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{job::JobSubcommand, macro_cmd::MacroSubcommand, queue::QueueSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pna",
    about = "Pick-and-assemble cell control: dispatch operations, record macros, run the job queue",
    version,
    propagate_version = true
)]
struct Cli {
    /// Cell root (default: auto-detect from .pna/)
    #[arg(long, global = true, env = "PNA_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Use the in-process simulated actuators instead of the configured driver
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a cell in the current directory
    Init {
        /// Point the driver at an actuator bridge instead of simulating
        #[arg(long)]
        bridge: Option<String>,
    },

    /// List the operation catalogue
    Ops {
        /// Only show operations for this device class
        device: Option<String>,
    },

    /// Dispatch a single operation (params as key=value)
    Dispatch {
        device: String,
        operation: String,
        params: Vec<String>,
    },

    /// Manage the job queue's contents
    Job {
        #[command(subcommand)]
        subcommand: JobSubcommand,
    },

    /// Drive the job runner
    Queue {
        #[command(subcommand)]
        subcommand: QueueSubcommand,
    },

    /// Record, inspect, import and replay macros
    Macro {
        #[command(subcommand)]
        subcommand: MacroSubcommand,
    },

    /// Start the HTTP control server
    Serve {
        #[arg(long, default_value_t = 3180)]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let sim = cli.simulate;

    let result = match cli.command {
        Commands::Init { bridge } => cmd::init::run(&root, bridge.as_deref()),
        Commands::Ops { device } => cmd::ops::run(device.as_deref(), cli.json),
        Commands::Dispatch {
            device,
            operation,
            params,
        } => cmd::dispatch::run(&root, sim, &device, &operation, &params, cli.json),
        Commands::Job { subcommand } => cmd::job::run(&root, sim, subcommand, cli.json),
        Commands::Queue { subcommand } => cmd::queue::run(&root, sim, subcommand, cli.json),
        Commands::Macro { subcommand } => cmd::macro_cmd::run(&root, sim, subcommand, cli.json),
        Commands::Serve { port } => cmd::serve::run(&root, sim, port),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
