//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// pawgen-publish - Digest, verify and deploy rendered pawgen sites
///
/// Records content digests for every output file, checks them before
/// publishing, and deploys the output tree to Netlify or Cloudflare Pages.
#[derive(Parser, Debug)]
#[command(name = "pawgen-publish")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PAWGEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .pawgen.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record digests for every file of an output directory
    Digest(DigestArgs),

    /// Check output files against their recorded digests
    Verify(VerifyArgs),

    /// Verify the output directory and deploy it
    Deploy(DeployArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the digest command
#[derive(Parser, Debug)]
pub struct DigestArgs {
    /// Output directory to digest
    pub dir: PathBuf,
}

/// Arguments for the verify command
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Output directory (defaults to output.dir from config)
    pub dir: Option<PathBuf>,
}

/// Arguments for the deploy command
#[derive(Parser, Debug)]
pub struct DeployArgs {
    /// Output directory (defaults to output.dir from config)
    pub dir: Option<PathBuf>,

    /// Provider to deploy to; repeatable (defaults to deploy.providers)
    #[arg(short, long = "provider", value_name = "PROVIDER")]
    pub providers: Vec<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., netlify.site_id)
        key: String,
        /// Value to set
        value: String,
        /// Write to project-local .pawgen.toml instead of global config
        #[arg(long)]
        local: bool,
    },
}
