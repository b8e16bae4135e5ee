use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod apps;
mod transport;

use transport::PhySelection;

#[derive(Debug, Parser)]
#[command(name = "phantom", version, about = "Emulate USB devices against a host")]
struct Cli {
    /// Verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the built-in device profiles (descriptions with -v).
    List,
    /// Emulate one device profile.
    Emulate(EmulateArgs),
    /// Find out which device profiles the host supports.
    Scan(ScanArgs),
    /// Record the mutation stages a session goes through.
    Makestages(MakestagesArgs),
    /// Guess the host operating system from its USB traffic.
    DetectOs(TransportArgs),
}

#[derive(Debug, Args)]
struct TransportArgs {
    /// Physical layer: `replay:<trace.json>`. Hardware backends (`fd:<port>`, `gadgetfs`) are
    /// recognised but not available in this build.
    #[arg(short = 'P', long = "phy", value_name = "PHY_INFO")]
    phy: Option<PhySelection>,
}

#[derive(Debug, Args)]
struct DeviceArgs {
    /// Device profile name (see `phantom list`).
    #[arg(short = 'C', long = "class", value_name = "DEVICE_CLASS")]
    class: String,

    /// Override the vendor id (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_u16)]
    vid: Option<u16>,

    /// Override the product id (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_u16)]
    pid: Option<u16>,
}

#[derive(Debug, Args)]
struct EmulateArgs {
    #[command(flatten)]
    transport: TransportArgs,

    #[command(flatten)]
    device: DeviceArgs,

    /// JSON table mapping stage names to replacement descriptor bytes.
    #[arg(long, value_name = "FILE")]
    mutations: Option<PathBuf>,

    /// Write every transport call of the session to this JSON file.
    #[arg(long, value_name = "FILE")]
    record: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ScanArgs {
    #[command(flatten)]
    transport: TransportArgs,

    /// Timeout for each device, in seconds.
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    /// Keep each device active until the timeout even once it is known to be supported.
    #[arg(short, long)]
    wait_for_timeout: bool,
}

#[derive(Debug, Args)]
struct MakestagesArgs {
    #[command(flatten)]
    transport: TransportArgs,

    #[command(flatten)]
    device: DeviceArgs,

    /// File to store the list of stages in.
    #[arg(short = 's', long = "stage-file", value_name = "FILE")]
    stage_file: PathBuf,
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid 16-bit id `{s}`: {e}"))
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::List => apps::list::run(cli.verbose > 0),
        Commands::Emulate(args) => apps::emulate::run(apps::emulate::EmulateOptions {
            transport: args.transport.phy,
            profile: args.device.class,
            vid: args.device.vid,
            pid: args.device.pid,
            mutations: args.mutations,
            record: args.record,
        }),
        Commands::Scan(args) => apps::scan::run(
            args.transport.phy,
            std::time::Duration::from_secs(args.timeout),
            args.wait_for_timeout,
        ),
        Commands::Makestages(args) => apps::makestages::run(apps::makestages::MakestagesOptions {
            transport: args.transport.phy,
            profile: args.device.class,
            vid: args.device.vid,
            pid: args.device.pid,
            stage_file: args.stage_file,
        }),
        Commands::DetectOs(_) => apps::detect_os::run(),
    }
}
