//! Synth command - Build and write the cloud assembly.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info, warn};

use lume_config::Settings;
use lume_iac::{App, CloudAssembly, ContextFile, SiteStack, SiteStackOptions, DEFAULT_FUNCTION_DIR};

use super::selected_environments;

#[derive(Args)]
pub struct SynthArgs {
    /// Settings file
    #[arg(short, long, env = "LUME_CONFIG", default_value = "config/config.yaml")]
    pub config: PathBuf,

    /// Cached lookup values (cdk.context.json layout)
    #[arg(long, env = "LUME_CONTEXT", default_value = "config/cdk.context.json")]
    pub context: PathBuf,

    /// Directory the cloud assembly is written to
    #[arg(short, long, env = "LUME_OUTPUT", default_value = "cdk.out")]
    pub output: PathBuf,

    /// Webhook function code
    #[arg(long, env = "LUME_FUNCTION_DIR", default_value = DEFAULT_FUNCTION_DIR)]
    pub function_dir: PathBuf,

    /// Environment key to consider (repeatable, defaults to dev and prod)
    #[arg(short, long = "environment", value_name = "KEY")]
    pub environments: Vec<String>,
}

/// What one synthesized stack exposes.
#[derive(Debug)]
struct StackSummary {
    environment: String,
    stack_name: String,
    site_domain: String,
    pipeline_name: String,
    webhook: bool,
}

pub fn execute(args: SynthArgs) -> Result<()> {
    let (assembly, summaries) = synthesize(&args)?;

    if summaries.is_empty() {
        println!("⚠️  No environment is flagged for deployment");
    }
    for summary in &summaries {
        println!("📦 {} ({})", summary.stack_name, summary.environment);
        println!("   🌐 https://{}", summary.site_domain);
        println!("   🔁 pipeline {}", summary.pipeline_name);
        if summary.webhook {
            println!("   🔔 state changes notified via webhook");
        }
    }
    println!();
    println!("✅ Cloud assembly written to {}", assembly.directory.display());

    Ok(())
}

fn synthesize(args: &SynthArgs) -> Result<(CloudAssembly, Vec<StackSummary>)> {
    let settings = Settings::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    let context = ContextFile::load(&args.context)
        .with_context(|| format!("Failed to read lookup context {}", args.context.display()))?;

    let names = selected_environments(&args.environments);
    let environments = settings
        .environments(names.as_slice())
        .context("Failed to resolve environment configuration")?;

    let options = SiteStackOptions::default().with_function_dir(&args.function_dir);
    let mut app = App::new();
    let mut summaries = Vec::new();

    for env in &environments {
        if !env.is_deploy {
            debug!("Skipping environment {}: deploy disabled", env.name);
            continue;
        }

        info!("Deploying stack: {}", env.stack_name);
        let site = SiteStack::build(env, &context, &options)
            .with_context(|| format!("Failed to build infrastructure for environment {}", env.name))?;

        summaries.push(StackSummary {
            environment: env.name.clone(),
            stack_name: env.stack_name.clone(),
            site_domain: env.site_domain(),
            pipeline_name: site.pipeline.pipeline_name().to_string(),
            webhook: site.webhook.is_some(),
        });
        app.add_stack(site.into_stack())
            .with_context(|| format!("Failed to add infrastructure stack for environment {}", env.name))?;
    }

    if app.is_empty() {
        warn!("No environment is flagged for deployment; writing an empty assembly");
    }

    let assembly = app
        .synth(&args.output)
        .with_context(|| format!("Failed to synthesize infrastructure into {}", args.output.display()))?;
    Ok((assembly, summaries))
}
