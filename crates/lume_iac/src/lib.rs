//! # lume_iac
//!
//! Declares the infrastructure of a statically generated site and
//! synthesizes it into a cloud assembly.
//!
//! Per environment this crate declares:
//!
//! - a static-file bucket and a CDN distribution reading it through an
//!   origin-access identity
//! - a DNS alias record in an existing hosted zone
//! - a Source → Build → Deploy release pipeline whose build job also
//!   invalidates the distribution cache
//! - optionally, a function notified of every pipeline state change
//!
//! Nothing is provisioned here. Resources are recorded in a [`Stack`] and
//! written out as CloudFormation templates by [`App::synth`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use lume_config::Settings;
//! use lume_iac::{App, ContextFile, SiteStack, SiteStackOptions};
//! use std::path::Path;
//!
//! let settings = Settings::from_file("config/config.yaml").unwrap();
//! let context = ContextFile::load("config/cdk.context.json").unwrap();
//! let prod = settings.environment("prod").unwrap();
//!
//! let site = SiteStack::build(&prod, &context, &SiteStackOptions::default()).unwrap();
//! let mut app = App::new();
//! app.add_stack(site.into_stack()).unwrap();
//! app.synth(Path::new("cdk.out")).unwrap();
//! ```

pub mod app;
pub mod asset;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod site;
pub mod site_stack;
pub mod stack;
pub mod template;

pub use app::{App, CloudAssembly};
pub use asset::FileAsset;
pub use context::{ContextFile, ContextProvider, HostedZone, HostedZoneQuery};
pub use error::{IacError, IacResult};
pub use pipeline::{
    assemble_pipeline, attach_webhook, build_action, build_project, deploy_action, source_action,
    Artifact, BuildSpec, PipelineAction, PipelineHandle, PipelineTargets, ProjectHandle,
    StageActions, WebhookHandle,
};
pub use provider::{AwsEnvironment, PriceClass, RemovalPolicy, ViewerProtocolPolicy};
pub use site::{alias_record, distribution, web_bucket, BucketHandle, DistributionHandle, RecordHandle};
pub use site_stack::{description_for, SiteStack, SiteStackOptions, DEFAULT_FUNCTION_DIR};
pub use stack::Stack;
pub use template::{Output, PolicyStatement, Resource};
