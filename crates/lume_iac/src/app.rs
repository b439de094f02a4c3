//! App: the set of stacks synthesized together into one cloud assembly.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{IacError, IacResult};
use crate::provider::{BOOTSTRAP_QUALIFIER, CLOUD_ASSEMBLY_VERSION};
use crate::stack::Stack;

/// Stacks to synthesize. Stack names are unique within an app.
#[derive(Debug, Clone, Default)]
pub struct App {
    stacks: Vec<Stack>,
}

/// Files written by [`App::synth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudAssembly {
    pub directory: PathBuf,
    pub manifest: PathBuf,
    /// Template file per stack, in app order.
    pub templates: Vec<PathBuf>,
    pub staged_assets: Vec<PathBuf>,
}

#[derive(Serialize)]
struct Manifest {
    version: &'static str,
    artifacts: BTreeMap<String, Artifact>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    #[serde(rename = "type")]
    artifact_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<String>,
    properties: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stack. A second stack with the same name is rejected.
    pub fn add_stack(&mut self, stack: Stack) -> IacResult<()> {
        if self.stacks.iter().any(|s| s.name() == stack.name()) {
            return Err(IacError::DuplicateStack(stack.name().to_string()));
        }
        debug!("Adding stack {} to app", stack.name());
        self.stacks.push(stack);
        Ok(())
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Write templates, staged assets, asset manifests and the assembly
    /// manifest into `outdir`.
    pub fn synth(&self, outdir: &Path) -> IacResult<CloudAssembly> {
        info!("Synthesizing {} stack(s) to {:?}", self.stacks.len(), outdir);
        fs::create_dir_all(outdir)?;

        let mut artifacts = BTreeMap::new();
        let mut templates = Vec::new();
        let mut staged_assets = Vec::new();

        for stack in &self.stacks {
            let template_file = format!("{}.template.json", stack.name());
            let template_path = outdir.join(&template_file);
            write_json(&template_path, &stack.to_template()?)?;
            debug!("Wrote {:?}", template_path);
            templates.push(template_path);

            let mut dependencies = Vec::new();
            if !stack.assets().is_empty() {
                for asset in stack.assets() {
                    staged_assets.push(asset.stage(outdir)?);
                }

                let assets_id = format!("{}.assets", stack.name());
                let assets_file = format!("{}.json", assets_id);
                write_json(&outdir.join(&assets_file), &asset_manifest(stack))?;

                artifacts.insert(
                    assets_id.clone(),
                    Artifact {
                        artifact_type: "cdk:asset-manifest",
                        environment: None,
                        properties: json!({
                            "file": assets_file,
                            "requiresBootstrapStackVersion": 6,
                            "bootstrapStackVersionSsmParameter":
                                format!("/cdk-bootstrap/{}/version", BOOTSTRAP_QUALIFIER),
                        }),
                        dependencies: Vec::new(),
                        display_name: None,
                    },
                );
                dependencies.push(assets_id);
            }

            artifacts.insert(
                stack.name().to_string(),
                Artifact {
                    artifact_type: "aws:cloudformation:stack",
                    environment: Some(stack.environment().as_uri()),
                    properties: json!({
                        "templateFile": template_file,
                        "validateOnSynth": false,
                    }),
                    dependencies,
                    display_name: Some(stack.name().to_string()),
                },
            );
        }

        let manifest_path = outdir.join("manifest.json");
        write_json(
            &manifest_path,
            &Manifest {
                version: CLOUD_ASSEMBLY_VERSION,
                artifacts,
            },
        )?;
        info!("Cloud assembly written to {:?}", outdir);

        Ok(CloudAssembly {
            directory: outdir.to_path_buf(),
            manifest: manifest_path,
            templates,
            staged_assets,
        })
    }
}

/// Publishing instructions for every file asset of `stack`.
fn asset_manifest(stack: &Stack) -> Value {
    let env = stack.environment();
    let files: serde_json::Map<String, Value> = stack
        .assets()
        .iter()
        .map(|asset| {
            let destination = format!("{}-{}", env.account, env.region);
            let entry = json!({
                "source": {
                    "path": asset.staged_name(),
                    "packaging": "zip",
                },
                "destinations": {
                    destination: {
                        "bucketName": env.asset_bucket_name(),
                        "objectKey": asset.object_key(),
                        "region": env.region,
                        "assumeRoleArn": env.file_publishing_role_arn(),
                    }
                },
            });
            (asset.hash.clone(), entry)
        })
        .collect();

    json!({
        "version": CLOUD_ASSEMBLY_VERSION,
        "files": files,
        "dockerImages": {},
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> IacResult<()> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}
