//! Release pipeline builders: stage actions, build project, the pipeline
//! itself and the optional state-change webhook.

use std::path::Path;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use lume_config::EnvironmentConfig;

use crate::asset::FileAsset;
use crate::error::IacResult;
use crate::provider::{RemovalPolicy, BOOTSTRAP_QUALIFIER};
use crate::site::{BucketHandle, DistributionHandle};
use crate::stack::Stack;
use crate::template::{assume_role_policy, cfn, policy_document, scoped_id, PolicyStatement, Resource};

/// Image the build job runs in.
pub const BUILD_IMAGE: &str = "aws/codebuild/amazonlinux2-x86_64-standard:5.0";

/// Directory the site build writes its files to.
pub const BUILD_OUTPUT_DIR: &str = "output";

/// Runtime of the webhook function.
pub const WEBHOOK_RUNTIME: &str = "python3.10";

/// Handler entry point inside the webhook asset.
pub const WEBHOOK_HANDLER: &str = "src.handler";

/// Event type emitted on every pipeline execution state change.
pub const PIPELINE_STATE_CHANGE: &str = "CodePipeline Pipeline Execution State Change";

const PIPELINE_ID: &str = "codepipeline";
const WEBHOOK_FUNCTION_ID: &str = "WebhookLambda";
const DISTRIBUTION_PLACEHOLDER: &str = "__DISTRIBUTION_ID__";

/// Opaque handoff between two pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    name: String,
}

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn to_value(&self) -> Value {
        json!({ "Name": self.name })
    }
}

/// Stage category an action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Source,
    Build,
    Deploy,
}

impl ActionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCategory::Source => "Source",
            ActionCategory::Build => "Build",
            ActionCategory::Deploy => "Deploy",
        }
    }
}

/// One pipeline action as declared inside a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineAction {
    pub name: String,
    pub category: ActionCategory,
    pub owner: &'static str,
    pub provider: &'static str,
    pub configuration: Map<String, Value>,
    pub inputs: Vec<Artifact>,
    pub outputs: Vec<Artifact>,
}

impl PipelineAction {
    fn to_value(&self) -> Value {
        let mut action = Map::new();
        action.insert(
            "ActionTypeId".into(),
            json!({
                "Category": self.category.as_str(),
                "Owner": self.owner,
                "Provider": self.provider,
                "Version": "1",
            }),
        );
        action.insert("Configuration".into(), Value::Object(self.configuration.clone()));
        if !self.inputs.is_empty() {
            action.insert(
                "InputArtifacts".into(),
                Value::Array(self.inputs.iter().map(Artifact::to_value).collect()),
            );
        }
        action.insert("Name".into(), json!(self.name));
        if !self.outputs.is_empty() {
            action.insert(
                "OutputArtifacts".into(),
                Value::Array(self.outputs.iter().map(Artifact::to_value).collect()),
            );
        }
        action.insert("RunOrder".into(), json!(1));
        Value::Object(action)
    }
}

/// The one action of each of the three stages.
#[derive(Debug, Clone)]
pub struct StageActions {
    pub source: PipelineAction,
    pub build: PipelineAction,
    pub deploy: PipelineAction,
}

impl StageActions {
    /// Stages in execution order.
    pub fn ordered(&self) -> [&PipelineAction; 3] {
        [&self.source, &self.build, &self.deploy]
    }
}

/// Commands of the site build job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub install: Vec<String>,
    pub build: Vec<String>,
    pub post_build: Vec<String>,
    pub base_directory: String,
    pub files: Vec<String>,
}

impl BuildSpec {
    /// Install Deno, build the site and invalidate every cached path of
    /// `distribution_id`.
    pub fn static_site(distribution_id: &str) -> Self {
        Self {
            install: vec![
                "echo \"Installing Deno\"".into(),
                "curl -fsSL https://deno.land/x/install/install.sh | sh".into(),
                "export DENO_INSTALL=\"$HOME/.deno\"".into(),
                "export PATH=\"$DENO_INSTALL/bin:$PATH\"".into(),
                "echo \"Deno installed successfully\"".into(),
                "deno --version".into(),
            ],
            build: vec![
                "echo \"Building Lume site\"".into(),
                "deno task build".into(),
                "echo \"Build completed successfully\"".into(),
                "echo \"Listing output directory contents:\"".into(),
                "ls -la".into(),
            ],
            post_build: vec![
                "echo \"Creating CloudFront invalidation\"".into(),
                format!(
                    "aws cloudfront create-invalidation --distribution-id {} --paths '/*'",
                    distribution_id
                ),
            ],
            base_directory: BUILD_OUTPUT_DIR.into(),
            files: vec!["**/*".into()],
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "version": "0.2",
            "phases": {
                "install": { "commands": self.install },
                "build": { "commands": self.build },
                "post_build": { "commands": self.post_build },
            },
            "artifacts": {
                "base-directory": self.base_directory,
                "files": self.files,
            },
        })
    }
}

/// Build project declared in a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHandle {
    construct_id: String,
    logical_id: String,
    role_id: String,
    project_name: String,
}

impl ProjectHandle {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn role_logical_id(&self) -> &str {
        &self.role_id
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn arn(&self) -> Value {
        cfn::get_att(&self.logical_id, "Arn")
    }
}

/// Release pipeline declared in a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineHandle {
    logical_id: String,
    pipeline_name: String,
}

impl PipelineHandle {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub fn name_ref(&self) -> Value {
        cfn::reference(&self.logical_id)
    }

    pub fn arn(&self) -> Value {
        cfn::join(
            "",
            vec![
                json!("arn:"),
                cfn::partition(),
                json!(":codepipeline:"),
                cfn::region(),
                json!(":"),
                cfn::account_id(),
                json!(":"),
                self.name_ref(),
            ],
        )
    }
}

/// Notification resources attached to a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookHandle {
    pub function_id: String,
    pub rule_id: String,
    pub asset_hash: String,
}

/// Source stage: poll the repository branch. The token is resolved from
/// the named secret at deploy time and never appears in the template.
pub fn source_action(config: &EnvironmentConfig) -> (Artifact, PipelineAction) {
    let output = Artifact::new("Artifact_Source_GitHub");

    let mut configuration = Map::new();
    configuration.insert("Owner".into(), json!(config.github_repo_owner));
    configuration.insert("Repo".into(), json!(config.github_repo_name));
    configuration.insert("Branch".into(), json!(config.branch));
    configuration.insert(
        "OAuthToken".into(),
        json!(format!(
            "{{{{resolve:secretsmanager:{}:SecretString:::}}}}",
            config.github_access_token
        )),
    );
    configuration.insert("PollForSourceChanges".into(), json!(true));

    let action = PipelineAction {
        name: "GitHub".into(),
        category: ActionCategory::Source,
        owner: "ThirdParty",
        provider: "GitHub",
        configuration,
        inputs: Vec::new(),
        outputs: vec![output.clone()],
    };
    (output, action)
}

/// Declare the build project that compiles the site and invalidates the
/// distribution cache.
///
/// The project's role gets exactly two statements: invalidation of this
/// one distribution, and starting/inspecting its own builds.
pub fn build_project(
    stack: &mut Stack,
    distribution: &DistributionHandle,
    config: &EnvironmentConfig,
) -> IacResult<(Artifact, ProjectHandle)> {
    let construct_id = scoped_id("BuildProject", &config.pipeline_name);
    let project_name = format!("{}-build", config.pipeline_name);

    let role = Resource::new("AWS::IAM::Role").with_properties(json!({
        "AssumeRolePolicyDocument": assume_role_policy("codebuild.amazonaws.com"),
    }));
    let role_id = stack.add_resource(&format!("{}-role", construct_id), role)?;

    let build_spec = build_spec_value(distribution)?;
    let project = Resource::new("AWS::CodeBuild::Project").with_properties(json!({
        "Artifacts": { "Type": "CODEPIPELINE" },
        "Cache": { "Type": "NO_CACHE" },
        "Environment": {
            "ComputeType": "BUILD_GENERAL1_SMALL",
            "Image": BUILD_IMAGE,
            "ImagePullCredentialsType": "CODEBUILD",
            "PrivilegedMode": false,
            "Type": "LINUX_CONTAINER",
        },
        "Name": project_name,
        "ServiceRole": cfn::get_att(&role_id, "Arn"),
        "Source": {
            "BuildSpec": build_spec,
            "Type": "CODEPIPELINE",
        },
    }));
    let logical_id = stack.add_resource(&construct_id, project)?;

    let handle = ProjectHandle {
        construct_id,
        logical_id,
        role_id,
        project_name,
    };

    let statements = [
        PolicyStatement::allow(
            &["cloudfront:CreateInvalidation"],
            vec![cfn::join(
                "",
                vec![
                    json!(format!("arn:aws:cloudfront::{}:distribution/", config.account)),
                    distribution.distribution_id(),
                ],
            )],
        ),
        PolicyStatement::allow(
            &["codebuild:StartBuild", "codebuild:BatchGetBuilds"],
            vec![handle.arn()],
        ),
    ];
    let policy_id = format!("{}-role-default-policy", handle.construct_id);
    let policy = Resource::new("AWS::IAM::Policy").with_properties(json!({
        "PolicyDocument": policy_document(&statements),
        "PolicyName": crate::template::logical_id(&policy_id),
        "Roles": [cfn::reference(&handle.role_id)],
    }));
    stack.add_resource(&policy_id, policy)?;

    debug!("Declared build project {}", handle.project_name);
    Ok((Artifact::new("Artifact_Build_CodeBuild"), handle))
}

/// Render the build spec. The distribution id is only known at deploy
/// time, so the JSON text is split around it and joined back in the template.
fn build_spec_value(distribution: &DistributionHandle) -> IacResult<Value> {
    let spec = BuildSpec::static_site(DISTRIBUTION_PLACEHOLDER);
    let rendered = serde_json::to_string_pretty(&spec.to_value())?;

    let mut parts = Vec::new();
    let mut pieces = rendered.split(DISTRIBUTION_PLACEHOLDER).peekable();
    while let Some(piece) = pieces.next() {
        parts.push(json!(piece));
        if pieces.peek().is_some() {
            parts.push(distribution.distribution_id());
        }
    }
    Ok(cfn::join("", parts))
}

/// Build stage: run the project on the source artifact.
pub fn build_action(project: &ProjectHandle, input: &Artifact, output: &Artifact) -> PipelineAction {
    let mut configuration = Map::new();
    configuration.insert("ProjectName".into(), cfn::reference(project.logical_id()));

    PipelineAction {
        name: "CodeBuild".into(),
        category: ActionCategory::Build,
        owner: "AWS",
        provider: "CodeBuild",
        configuration,
        inputs: vec![input.clone()],
        outputs: vec![output.clone()],
    }
}

/// Deploy stage: extract the build output into the web bucket as is.
pub fn deploy_action(input: &Artifact, bucket: &BucketHandle) -> PipelineAction {
    let mut configuration = Map::new();
    configuration.insert("BucketName".into(), bucket.bucket_name());
    configuration.insert("Extract".into(), json!("true"));

    PipelineAction {
        name: "DeployToS3".into(),
        category: ActionCategory::Deploy,
        owner: "AWS",
        provider: "S3",
        configuration,
        inputs: vec![input.clone()],
        outputs: Vec::new(),
    }
}

/// Upstream resources the pipeline deploys to.
#[derive(Debug, Clone, Copy)]
pub struct PipelineTargets<'a> {
    pub bucket: &'a BucketHandle,
    pub distribution: &'a DistributionHandle,
    pub project: &'a ProjectHandle,
}

/// Declare the Source → Build → Deploy pipeline.
///
/// The pipeline is ordered after the web bucket and the distribution.
/// When the environment has a webhook URL, a state-change notifier is
/// attached using the function code in `function_dir`; otherwise no
/// notification resources are declared.
pub fn assemble_pipeline(
    stack: &mut Stack,
    config: &EnvironmentConfig,
    actions: &StageActions,
    targets: PipelineTargets<'_>,
    function_dir: &Path,
) -> IacResult<(PipelineHandle, Option<WebhookHandle>)> {
    let artifacts = Resource::new("AWS::S3::Bucket")
        .with_properties(json!({
            "BucketEncryption": {
                "ServerSideEncryptionConfiguration": [{
                    "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" }
                }]
            },
            "BucketName": config.pipeline_bucket,
            "PublicAccessBlockConfiguration": {
                "BlockPublicAcls": true,
                "BlockPublicPolicy": true,
                "IgnorePublicAcls": true,
                "RestrictPublicBuckets": true,
            },
        }))
        .with_removal_policy(RemovalPolicy::Retain);
    let artifacts = BucketHandle::new(stack.add_resource(&format!("{}-artifacts-bucket", PIPELINE_ID), artifacts)?);

    let role = Resource::new("AWS::IAM::Role").with_properties(json!({
        "AssumeRolePolicyDocument": assume_role_policy("codepipeline.amazonaws.com"),
    }));
    let role_id = stack.add_resource(&format!("{}-role", PIPELINE_ID), role)?;

    let pipeline_statements = [
        PolicyStatement::allow(
            BUCKET_READ_WRITE,
            vec![artifacts.arn(), artifacts.arn_for_objects("*")],
        ),
        PolicyStatement::allow(
            &["codebuild:BatchGetBuilds", "codebuild:StartBuild", "codebuild:StopBuild"],
            vec![targets.project.arn()],
        ),
        PolicyStatement::allow(
            BUCKET_READ_WRITE,
            vec![targets.bucket.arn(), targets.bucket.arn_for_objects("*")],
        ),
    ];
    let role_policy_id = format!("{}-role-default-policy", PIPELINE_ID);
    let role_policy = Resource::new("AWS::IAM::Policy").with_properties(json!({
        "PolicyDocument": policy_document(&pipeline_statements),
        "PolicyName": crate::template::logical_id(&role_policy_id),
        "Roles": [cfn::reference(&role_id)],
    }));
    let role_policy_id = stack.add_resource(&role_policy_id, role_policy)?;

    grant_build_runtime(stack, config, targets.project, &artifacts)?;

    let stages: Vec<Value> = actions
        .ordered()
        .iter()
        .map(|action| {
            json!({
                "Actions": [action.to_value()],
                "Name": action.category.as_str(),
            })
        })
        .collect();

    let pipeline = Resource::new("AWS::CodePipeline::Pipeline").with_properties(json!({
        "ArtifactStore": {
            "Location": artifacts.bucket_name(),
            "Type": "S3",
        },
        "Name": config.pipeline_name,
        "RestartExecutionOnUpdate": false,
        "RoleArn": cfn::get_att(&role_id, "Arn"),
        "Stages": stages,
    }));
    let logical_id = stack.add_resource(PIPELINE_ID, pipeline)?;

    for dependency in [
        role_id.as_str(),
        role_policy_id.as_str(),
        targets.bucket.logical_id(),
        targets.distribution.logical_id(),
    ] {
        stack.add_dependency(&logical_id, dependency)?;
    }

    let handle = PipelineHandle {
        logical_id,
        pipeline_name: config.pipeline_name.clone(),
    };
    info!("Declared pipeline {}", handle.pipeline_name);

    let webhook = if config.has_webhook() {
        info!("Creating webhook for pipeline {}", handle.pipeline_name);
        Some(attach_webhook(stack, &handle, config, function_dir)?)
    } else {
        None
    };

    Ok((handle, webhook))
}

const BUCKET_READ_WRITE: &[&str] = &[
    "s3:Abort*",
    "s3:DeleteObject*",
    "s3:GetBucket*",
    "s3:GetObject*",
    "s3:List*",
    "s3:PutObject",
];

/// Log delivery and artifact access the build runner needs on top of the
/// project's own grants.
fn grant_build_runtime(
    stack: &mut Stack,
    config: &EnvironmentConfig,
    project: &ProjectHandle,
    artifacts: &BucketHandle,
) -> IacResult<()> {
    let log_group = format!(
        "arn:aws:logs:{}:{}:log-group:/aws/codebuild/{}",
        config.region, config.account, project.project_name()
    );
    let statements = [
        PolicyStatement::allow(
            &["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
            vec![json!(log_group.clone()), json!(format!("{}:*", log_group))],
        ),
        PolicyStatement::allow(
            BUCKET_READ_WRITE,
            vec![artifacts.arn(), artifacts.arn_for_objects("*")],
        ),
    ];

    let policy_id = format!("{}-runtime-policy", project.construct_id);
    let policy = Resource::new("AWS::IAM::Policy").with_properties(json!({
        "PolicyDocument": policy_document(&statements),
        "PolicyName": crate::template::logical_id(&policy_id),
        "Roles": [cfn::reference(project.role_logical_id())],
    }));
    stack.add_resource(&policy_id, policy)?;
    Ok(())
}

/// Subscribe a notification function to the pipeline's state changes.
///
/// The function receives the webhook URL and pipeline name through its
/// environment. Delivery and retries are left to the event bus.
pub fn attach_webhook(
    stack: &mut Stack,
    pipeline: &PipelineHandle,
    config: &EnvironmentConfig,
    function_dir: &Path,
) -> IacResult<WebhookHandle> {
    let asset = FileAsset::from_directory(function_dir)?;

    let role = Resource::new("AWS::IAM::Role").with_properties(json!({
        "AssumeRolePolicyDocument": assume_role_policy("lambda.amazonaws.com"),
        "ManagedPolicyArns": [cfn::join("", vec![
            json!("arn:"),
            cfn::partition(),
            json!(":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"),
        ])],
    }));
    let role_id = stack.add_resource(&format!("{}-service-role", WEBHOOK_FUNCTION_ID), role)?;

    let function = Resource::new("AWS::Lambda::Function").with_properties(json!({
        "Code": {
            "S3Bucket": cfn::sub(&format!(
                "cdk-{}-assets-${{AWS::AccountId}}-${{AWS::Region}}",
                BOOTSTRAP_QUALIFIER
            )),
            "S3Key": asset.object_key(),
        },
        "Environment": {
            "Variables": {
                "DISCORD_WEBHOOKS_URL": config.discord_webhook_url,
                "PIPELINE_NAME": pipeline.name_ref(),
            }
        },
        "Handler": WEBHOOK_HANDLER,
        "Role": cfn::get_att(&role_id, "Arn"),
        "Runtime": WEBHOOK_RUNTIME,
    }));
    let function_id = stack.add_resource(WEBHOOK_FUNCTION_ID, function)?;
    stack.add_dependency(&function_id, &role_id)?;

    let rule = Resource::new("AWS::Events::Rule").with_properties(json!({
        "Description": "Lambda function to describe state changes",
        "EventPattern": {
            "detail-type": [PIPELINE_STATE_CHANGE],
            "resources": [pipeline.arn()],
            "source": ["aws.codepipeline"],
        },
        "State": "ENABLED",
        "Targets": [{
            "Arn": cfn::get_att(&function_id, "Arn"),
            "Id": "Target0",
        }],
    }));
    let rule_id = stack.add_resource(&format!("{}-webhook-event", PIPELINE_ID), rule)?;

    let permission = Resource::new("AWS::Lambda::Permission").with_properties(json!({
        "Action": "lambda:InvokeFunction",
        "FunctionName": cfn::get_att(&function_id, "Arn"),
        "Principal": "events.amazonaws.com",
        "SourceArn": cfn::get_att(&rule_id, "Arn"),
    }));
    stack.add_resource(&format!("{}-webhook-event-allow-invoke", PIPELINE_ID), permission)?;

    let asset_hash = asset.hash.clone();
    stack.add_asset(asset);

    Ok(WebhookHandle {
        function_id,
        rule_id,
        asset_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::AwsEnvironment;
    use crate::site::{distribution, web_bucket};
    use crate::testing::{sample_config, write_function_dir};
    use tempfile::tempdir;

    struct Fixture {
        stack: Stack,
        bucket: BucketHandle,
        distribution: DistributionHandle,
        project: ProjectHandle,
        actions: StageActions,
    }

    fn fixture(config: &EnvironmentConfig) -> Fixture {
        let mut stack = Stack::new("SiteStack", AwsEnvironment::from_config(config));
        let bucket = web_bucket(&mut stack, config).unwrap();
        let dist = distribution(&mut stack, &bucket, config).unwrap();
        let (source_output, source) = source_action(config);
        let (build_output, project) = build_project(&mut stack, &dist, config).unwrap();
        let build = build_action(&project, &source_output, &build_output);
        let deploy = deploy_action(&build_output, &bucket);

        Fixture {
            stack,
            bucket,
            distribution: dist,
            project,
            actions: StageActions { source, build, deploy },
        }
    }

    fn assemble(config: &EnvironmentConfig, function_dir: &Path) -> (Stack, PipelineHandle, Option<WebhookHandle>) {
        let mut f = fixture(config);
        let targets = PipelineTargets {
            bucket: &f.bucket,
            distribution: &f.distribution,
            project: &f.project,
        };
        let (pipeline, webhook) =
            assemble_pipeline(&mut f.stack, config, &f.actions, targets, function_dir).unwrap();
        (f.stack, pipeline, webhook)
    }

    #[test]
    fn test_source_action_references_secret_by_name() {
        let config = sample_config();
        let (artifact, action) = source_action(&config);

        assert_eq!(artifact.name(), "Artifact_Source_GitHub");
        assert_eq!(action.configuration["Owner"], json!("acme"));
        assert_eq!(action.configuration["Repo"], json!("site"));
        assert_eq!(action.configuration["Branch"], json!("main"));
        assert_eq!(
            action.configuration["OAuthToken"],
            json!("{{resolve:secretsmanager:site/github-token:SecretString:::}}")
        );
    }

    #[test]
    fn test_build_spec_phases() {
        let spec = BuildSpec::static_site("E123");
        assert!(spec.install.iter().any(|c| c.contains("deno.land/x/install")));
        assert!(spec.build.contains(&"deno task build".to_string()));
        assert_eq!(
            spec.post_build.last().unwrap(),
            "aws cloudfront create-invalidation --distribution-id E123 --paths '/*'"
        );

        let value = spec.to_value();
        assert_eq!(value["artifacts"]["base-directory"], json!("output"));
        assert_eq!(value["artifacts"]["files"], json!(["**/*"]));
    }

    #[test]
    fn test_build_spec_joins_distribution_reference() {
        let config = sample_config();
        let f = fixture(&config);
        let project = f.stack.resource(f.project.logical_id()).unwrap();
        let spec = &project.property("Source").unwrap()["BuildSpec"]["Fn::Join"];

        let parts = spec[1].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], f.distribution.distribution_id());
        assert!(parts[0].as_str().unwrap().ends_with("--distribution-id "));
        assert!(parts[2].as_str().unwrap().starts_with(" --paths '/*'"));
    }

    #[test]
    fn test_build_role_has_exactly_two_scoped_grants() {
        let config = sample_config();
        let f = fixture(&config);

        let (_, policy) = f
            .stack
            .resources_of_type("AWS::IAM::Policy")
            .find(|(_, r)| r.property("Roles") == Some(&json!([{ "Ref": f.project.role_logical_id() }])))
            .unwrap();
        let statements = policy.property("PolicyDocument").unwrap()["Statement"].as_array().unwrap();
        assert_eq!(statements.len(), 2);

        assert_eq!(statements[0]["Action"], json!("cloudfront:CreateInvalidation"));
        assert_eq!(
            statements[0]["Resource"],
            cfn::join(
                "",
                vec![
                    json!("arn:aws:cloudfront::123456789012:distribution/"),
                    f.distribution.distribution_id(),
                ]
            )
        );
        assert_eq!(
            statements[1]["Action"],
            json!(["codebuild:StartBuild", "codebuild:BatchGetBuilds"])
        );
        assert_eq!(statements[1]["Resource"], f.project.arn());
    }

    #[test]
    fn test_pipeline_has_three_ordered_stages() {
        let config = sample_config();
        let dir = tempdir().unwrap();
        let (stack, pipeline, _) = assemble(&config, dir.path());

        let resource = stack.resource(pipeline.logical_id()).unwrap();
        let stages = resource.property("Stages").unwrap().as_array().unwrap();
        let names: Vec<_> = stages.iter().map(|s| s["Name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Source", "Build", "Deploy"]);
        assert!(stages.iter().all(|s| s["Actions"].as_array().unwrap().len() == 1));

        assert_eq!(stages[1]["Actions"][0]["InputArtifacts"][0]["Name"], json!("Artifact_Source_GitHub"));
        assert_eq!(stages[2]["Actions"][0]["InputArtifacts"][0]["Name"], json!("Artifact_Build_CodeBuild"));
        assert_eq!(stages[2]["Actions"][0]["Configuration"]["Extract"], json!("true"));
        assert_eq!(resource.property("Name"), Some(&json!("site-pipeline")));
    }

    #[test]
    fn test_pipeline_waits_for_bucket_and_distribution() {
        let config = sample_config();
        let dir = tempdir().unwrap();
        let mut f = fixture(&config);
        let targets = PipelineTargets {
            bucket: &f.bucket,
            distribution: &f.distribution,
            project: &f.project,
        };
        let (pipeline, _) =
            assemble_pipeline(&mut f.stack, &config, &f.actions, targets, dir.path()).unwrap();

        let depends_on = &f.stack.resource(pipeline.logical_id()).unwrap().depends_on;
        assert!(depends_on.contains(f.bucket.logical_id()));
        assert!(depends_on.contains(f.distribution.logical_id()));
    }

    #[test]
    fn test_artifact_store_uses_configured_bucket_name() {
        let config = sample_config();
        let dir = tempdir().unwrap();
        let (stack, pipeline, _) = assemble(&config, dir.path());

        let store = stack.resource(pipeline.logical_id()).unwrap().property("ArtifactStore").unwrap();
        let store_id = store["Location"]["Ref"].as_str().unwrap();
        let bucket = stack.resource(store_id).unwrap();
        assert_eq!(bucket.property("BucketName"), Some(&json!("site-artifacts")));
    }

    #[test]
    fn test_empty_webhook_attaches_nothing() {
        let mut config = sample_config();
        config.discord_webhook_url = String::new();
        let dir = tempdir().unwrap();

        let (stack, _, webhook) = assemble(&config, &dir.path().join("absent"));
        assert!(webhook.is_none());
        assert_eq!(stack.resources_of_type("AWS::Events::Rule").count(), 0);
        assert_eq!(stack.resources_of_type("AWS::Lambda::Function").count(), 0);
        assert!(stack.assets().is_empty());
    }

    #[test]
    fn test_webhook_attaches_exactly_one_subscriber() {
        let mut config = sample_config();
        config.discord_webhook_url = "https://discord.example/api/webhooks/1".into();
        let dir = tempdir().unwrap();
        write_function_dir(dir.path());

        let (stack, pipeline, webhook) = assemble(&config, dir.path());
        let webhook = webhook.unwrap();

        let rules: Vec<_> = stack.resources_of_type("AWS::Events::Rule").collect();
        assert_eq!(rules.len(), 1);
        let (_, rule) = rules[0];
        assert_eq!(rule.property("EventPattern").unwrap()["resources"], json!([pipeline.arn()]));
        assert_eq!(
            rule.property("EventPattern").unwrap()["detail-type"],
            json!([PIPELINE_STATE_CHANGE])
        );
        assert_eq!(
            rule.property("Targets").unwrap()[0]["Arn"],
            cfn::get_att(&webhook.function_id, "Arn")
        );

        let function = stack.resource(&webhook.function_id).unwrap();
        let variables = &function.property("Environment").unwrap()["Variables"];
        assert_eq!(variables["DISCORD_WEBHOOKS_URL"], json!("https://discord.example/api/webhooks/1"));
        assert_eq!(variables["PIPELINE_NAME"], pipeline.name_ref());
        let asset_bucket =
            AwsEnvironment::new("${AWS::AccountId}", "${AWS::Region}").asset_bucket_name();
        assert_eq!(function.property("Code").unwrap()["S3Bucket"], cfn::sub(&asset_bucket));
        assert_eq!(
            function.property("Code").unwrap()["S3Key"],
            json!(format!("{}.zip", webhook.asset_hash))
        );
        assert_eq!(stack.resources_of_type("AWS::Lambda::Permission").count(), 1);
        assert_eq!(stack.assets().len(), 1);
        assert_eq!(stack.assets()[0].hash, webhook.asset_hash);
    }

    #[test]
    fn test_webhook_without_function_code_fails() {
        let mut config = sample_config();
        config.discord_webhook_url = "https://discord.example/api/webhooks/1".into();
        let dir = tempdir().unwrap();

        let mut f = fixture(&config);
        let targets = PipelineTargets {
            bucket: &f.bucket,
            distribution: &f.distribution,
            project: &f.project,
        };
        let result = assemble_pipeline(
            &mut f.stack,
            &config,
            &f.actions,
            targets,
            &dir.path().join("absent"),
        );
        assert!(result.is_err());
    }
}
