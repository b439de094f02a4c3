//! Resource graph of one stack.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::asset::FileAsset;
use crate::error::{IacError, IacResult};
use crate::provider::AwsEnvironment;
use crate::template::{logical_id, Output, Resource};

/// Unit of infrastructure deployed and torn down together.
///
/// Adding a resource is the only way to declare it; there is no separate
/// apply step. Ordering constraints beyond what references imply are
/// recorded with [`Stack::add_dependency`].
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    description: Option<String>,
    environment: AwsEnvironment,
    resources: BTreeMap<String, Resource>,
    outputs: BTreeMap<String, Output>,
    assets: Vec<FileAsset>,
}

impl Stack {
    pub fn new(name: impl Into<String>, environment: AwsEnvironment) -> Self {
        Self {
            name: name.into(),
            description: None,
            environment,
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            assets: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn environment(&self) -> &AwsEnvironment {
        &self.environment
    }

    /// Register a resource under a construct id and return its logical id.
    pub fn add_resource(&mut self, construct_id: &str, resource: Resource) -> IacResult<String> {
        let id = logical_id(construct_id);
        if self.resources.contains_key(&id) {
            return Err(IacError::DuplicateConstruct {
                stack: self.name.clone(),
                construct: construct_id.to_string(),
                logical_id: id,
            });
        }

        debug!("{}: declaring {} as {}", self.name, resource.resource_type, id);
        self.resources.insert(id.clone(), resource);
        Ok(id)
    }

    /// Require `dependency` to be created before `dependent`.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> IacResult<()> {
        if !self.resources.contains_key(dependency) {
            return Err(self.unknown(dependency));
        }
        let resource = self
            .resources
            .get_mut(dependent)
            .ok_or_else(|| IacError::UnknownResource {
                stack: self.name.clone(),
                logical_id: dependent.to_string(),
            })?;
        resource.depends_on.insert(dependency.to_string());
        Ok(())
    }

    /// Register an output. Output names keep their case; only
    /// non-alphanumeric characters are dropped.
    pub fn add_output(&mut self, construct_id: &str, output: Output) -> IacResult<String> {
        let id: String = construct_id.chars().filter(char::is_ascii_alphanumeric).collect();
        if self.outputs.contains_key(&id) {
            return Err(IacError::DuplicateConstruct {
                stack: self.name.clone(),
                construct: construct_id.to_string(),
                logical_id: id,
            });
        }
        self.outputs.insert(id.clone(), output);
        Ok(id)
    }

    /// Attach a file asset; the same content is only recorded once.
    pub fn add_asset(&mut self, asset: FileAsset) {
        if !self.assets.iter().any(|a| a.hash == asset.hash) {
            self.assets.push(asset);
        }
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn resource_mut(&mut self, logical_id: &str) -> IacResult<&mut Resource> {
        self.resources
            .get_mut(logical_id)
            .ok_or_else(|| IacError::UnknownResource {
                stack: self.name.clone(),
                logical_id: logical_id.to_string(),
            })
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.resources.contains_key(logical_id)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.resources.iter().map(|(id, r)| (id.as_str(), r))
    }

    /// All resources of one type, in logical id order.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Resource)> + 'a {
        self.resources()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    pub fn assets(&self) -> &[FileAsset] {
        &self.assets
    }

    /// Render the deployment template.
    pub fn to_template(&self) -> IacResult<Value> {
        let mut template = Map::new();
        template.insert("AWSTemplateFormatVersion".into(), json!("2010-09-09"));
        if let Some(description) = &self.description {
            template.insert("Description".into(), json!(description));
        }
        template.insert("Resources".into(), serde_json::to_value(&self.resources)?);
        if !self.outputs.is_empty() {
            template.insert("Outputs".into(), serde_json::to_value(&self.outputs)?);
        }
        Ok(Value::Object(template))
    }

    fn unknown(&self, logical_id: &str) -> IacError {
        IacError::UnknownResource {
            stack: self.name.clone(),
            logical_id: logical_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::cfn;

    fn stack() -> Stack {
        Stack::new("TestStack", AwsEnvironment::new("123456789012", "us-east-1"))
    }

    #[test]
    fn test_duplicate_construct_rejected() {
        let mut stack = stack();
        stack.add_resource("web-bucket", Resource::new("AWS::S3::Bucket")).unwrap();
        let err = stack
            .add_resource("web.bucket", Resource::new("AWS::S3::Bucket"))
            .unwrap_err();
        assert!(matches!(err, IacError::DuplicateConstruct { ref logical_id, .. } if logical_id == "WebBucket"));
    }

    #[test]
    fn test_dependency_requires_both_resources() {
        let mut stack = stack();
        let a = stack.add_resource("a", Resource::new("AWS::S3::Bucket")).unwrap();
        let b = stack.add_resource("b", Resource::new("AWS::S3::Bucket")).unwrap();

        stack.add_dependency(&b, &a).unwrap();
        assert!(stack.resource(&b).unwrap().depends_on.contains("A"));
        assert!(stack.add_dependency(&b, "Missing").is_err());
        assert!(stack.add_dependency("Missing", &a).is_err());
    }

    #[test]
    fn test_template_layout() {
        let mut stack = stack().with_description("demo");
        let id = stack.add_resource("bucket", Resource::new("AWS::S3::Bucket")).unwrap();
        stack
            .add_output("bucket-name", Output::new(cfn::reference(&id)).with_description("name"))
            .unwrap();

        let template = stack.to_template().unwrap();
        assert_eq!(template["Description"], json!("demo"));
        assert_eq!(template["Resources"]["Bucket"]["Type"], json!("AWS::S3::Bucket"));
        assert_eq!(template["Outputs"]["bucketname"]["Value"], json!({ "Ref": "Bucket" }));
        assert_eq!(template["Outputs"]["bucketname"]["Description"], json!("name"));
    }
}
