//! otanode CLI
//!
//! Command-line tools for otanode sensor nodes.
//!
//! # Commands
//!
//! - `serve` - Run the OTA server over a device root
//! - `deploy` - Sync a working tree to a device
//! - `hash` - Print content hashes the way a device lists them
//! - `keygen` - Generate a new shared secret
//! - `render-config` - Print the rendered configuration for a device

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// otanode device and deployment tools.
#[derive(Parser)]
#[command(name = "otanode")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the OTA server over a device root
    Serve {
        /// Device root holding the secret and deployed files
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Port to listen on (overrides node.json)
        #[arg(short, long)]
        port: Option<u16>,

        /// Read chunk size (overrides node.json)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Stop serving on reboot instead of exiting the process
        #[arg(long)]
        no_reset: bool,
    },

    /// Sync a working tree to a device
    Deploy {
        /// Device name in the registry
        device: String,

        /// Device registry file
        #[arg(long, default_value = "devices.json")]
        registry: PathBuf,

        /// Working tree holding the deploy listing
        #[arg(short, long, default_value = ".")]
        work_dir: PathBuf,

        /// Authenticate every change but apply none
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Do not reboot the device after changing it
        #[arg(long)]
        no_reboot: bool,

        /// Print a unified diff for every changed text file
        #[arg(short, long)]
        diff: bool,
    },

    /// Print content hashes the way a device lists them
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Generate a new shared secret
    Keygen {
        /// Write the secret to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the rendered configuration for a device
    RenderConfig {
        /// Device name in the registry
        device: String,

        /// Device registry file
        #[arg(long, default_value = "devices.json")]
        registry: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            root,
            port,
            chunk_size,
            no_reset,
        } => {
            commands::serve::run(&root, port, chunk_size, no_reset)?;
        }
        Commands::Deploy {
            device,
            registry,
            work_dir,
            dry_run,
            no_reboot,
            diff,
        } => {
            let options = commands::deploy::DeployOptions {
                dry_run,
                reboot: !no_reboot,
                show_diff: diff,
            };
            commands::deploy::run(&registry, &device, &work_dir, &options)?;
        }
        Commands::Hash { files, format } => {
            commands::hash::run(&files, &format)?;
        }
        Commands::Keygen { output } => {
            commands::keygen::run(output.as_deref())?;
        }
        Commands::RenderConfig { device, registry } => {
            commands::render::run(&registry, &device)?;
        }
        Commands::Version => {
            println!("otanode CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
