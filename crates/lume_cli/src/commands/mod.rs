//! CLI command definitions.
//!
//! Each subcommand maps to one step of the site infrastructure workflow.

use clap::{Parser, Subcommand};

pub mod list;
pub mod synth;

/// Environment keys used when none are given on the command line.
pub(crate) fn selected_environments(requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        lume_config::DEFAULT_ENVIRONMENTS
            .iter()
            .map(|name| name.to_string())
            .collect()
    } else {
        requested.to_vec()
    }
}

/// Lume - static site infrastructure synthesizer
#[derive(Parser)]
#[command(name = "lume")]
#[command(version, about = "Lume - static site infrastructure synthesizer")]
#[command(long_about = r#"
Declares the hosting and delivery infrastructure of a statically generated
site (storage bucket, CDN distribution, DNS alias and release pipeline) and
writes it as a cloud assembly ready for deployment.

WORKFLOWS:
  synth  → Build one stack per deploy-flagged environment and write the assembly
  list   → Show configured environments and whether they would be deployed

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration error
  5 - Infrastructure error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize the cloud assembly
    Synth(synth::SynthArgs),

    /// List configured environments
    List(list::ListArgs),
}
