//! Composition root: one environment's complete site stack.

use std::path::PathBuf;

use tracing::info;

use lume_config::EnvironmentConfig;

use crate::context::ContextProvider;
use crate::error::IacResult;
use crate::pipeline::{
    assemble_pipeline, build_action, build_project, deploy_action, source_action, PipelineHandle,
    PipelineTargets, StageActions, WebhookHandle,
};
use crate::provider::AwsEnvironment;
use crate::site::{alias_record, distribution, web_bucket, BucketHandle, DistributionHandle, RecordHandle};
use crate::stack::Stack;
use crate::template::Output;

/// Default location of the webhook function code, relative to the working directory.
pub const DEFAULT_FUNCTION_DIR: &str = "functions/pipeline-lambda";

/// Knobs that are not part of the environment record.
#[derive(Debug, Clone)]
pub struct SiteStackOptions {
    /// Overrides the generated stack description.
    pub description: Option<String>,
    /// Directory holding the webhook function code.
    pub function_dir: PathBuf,
}

impl Default for SiteStackOptions {
    fn default() -> Self {
        Self {
            description: None,
            function_dir: PathBuf::from(DEFAULT_FUNCTION_DIR),
        }
    }
}

impl SiteStackOptions {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_function_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.function_dir = dir.into();
        self
    }
}

/// Stack description used when none is given.
pub fn description_for(config: &EnvironmentConfig) -> String {
    format!("Static site infrastructure for {}", config.environment_type)
}

/// Everything declared for one environment.
#[derive(Debug, Clone)]
pub struct SiteStack {
    pub stack: Stack,
    pub bucket: BucketHandle,
    pub distribution: DistributionHandle,
    pub record: RecordHandle,
    pub pipeline: PipelineHandle,
    pub webhook: Option<WebhookHandle>,
}

impl SiteStack {
    /// Declare bucket, distribution, alias record and release pipeline for
    /// `config`, plus the three stack outputs.
    pub fn build(
        config: &EnvironmentConfig,
        context: &dyn ContextProvider,
        options: &SiteStackOptions,
    ) -> IacResult<Self> {
        info!("Building stack {} for {}", config.stack_name, config.name);

        let description = options
            .description
            .clone()
            .unwrap_or_else(|| description_for(config));
        let mut stack =
            Stack::new(&config.stack_name, AwsEnvironment::from_config(config)).with_description(description);

        let bucket = web_bucket(&mut stack, config)?;
        let distribution = distribution(&mut stack, &bucket, config)?;
        let record = alias_record(&mut stack, config, &distribution, context)?;

        let (source_output, source) = source_action(config);
        let (build_output, project) = build_project(&mut stack, &distribution, config)?;
        let actions = StageActions {
            source,
            build: build_action(&project, &source_output, &build_output),
            deploy: deploy_action(&build_output, &bucket),
        };
        let targets = PipelineTargets {
            bucket: &bucket,
            distribution: &distribution,
            project: &project,
        };
        let (pipeline, webhook) =
            assemble_pipeline(&mut stack, config, &actions, targets, &options.function_dir)?;

        stack.add_output(
            "cloudfrontweburl",
            Output::new(distribution.domain_name()).with_description("cloudfront website url"),
        )?;
        stack.add_output(
            "s3bucketweburl",
            Output::new(bucket.website_url()).with_description("s3 bucket website url"),
        )?;
        stack.add_output(
            "customdomainname",
            Output::new(serde_json::Value::String(config.site_domain()))
                .with_description("custom domain name"),
        )?;

        Ok(Self {
            stack,
            bucket,
            distribution,
            record,
            pipeline,
            webhook,
        })
    }

    pub fn into_stack(self) -> Stack {
        self.stack
    }
}
