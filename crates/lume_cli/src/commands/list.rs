//! List command - Show configured environments.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use lume_config::{EnvironmentConfig, Settings};

#[derive(Args)]
pub struct ListArgs {
    /// Settings file
    #[arg(short, long, env = "LUME_CONFIG", default_value = "config/config.yaml")]
    pub config: PathBuf,

    /// Environment key to show (repeatable, defaults to every section)
    #[arg(short, long = "environment", value_name = "KEY")]
    pub environments: Vec<String>,
}

pub fn execute(args: ListArgs) -> Result<()> {
    let settings = Settings::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    let environments = load(&settings, &args.environments)?;
    println!("📋 Stack {}", settings.stack_name());
    for env in &environments {
        println!("{}", describe(env));
    }

    Ok(())
}

fn load(settings: &Settings, requested: &[String]) -> Result<Vec<EnvironmentConfig>> {
    let environments = if requested.is_empty() {
        settings.environments(settings.environment_names().as_slice())
    } else {
        settings.environments(requested)
    };
    environments.context("Failed to resolve environment configuration")
}

fn describe(env: &EnvironmentConfig) -> String {
    let marker = if env.is_deploy { "🚀" } else { "⏸️ " };
    format!(
        "   {} {:<8} {}/{} {} ({}){}",
        marker,
        env.name,
        env.account,
        env.region,
        env.site_domain(),
        if env.is_deploy { "deploy" } else { "skip" },
        if env.has_webhook() { " 🔔" } else { "" }
    )
}
