//! Template building blocks: resources, outputs, IAM statements and
//! intrinsic functions.

use std::collections::BTreeSet;

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::provider::RemovalPolicy;

/// Intrinsic functions and pseudo parameters.
pub mod cfn {
    use serde_json::{json, Value};

    pub fn reference(logical_id: &str) -> Value {
        json!({ "Ref": logical_id })
    }

    pub fn get_att(logical_id: &str, attribute: &str) -> Value {
        json!({ "Fn::GetAtt": [logical_id, attribute] })
    }

    pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
        json!({ "Fn::Join": [delimiter, parts] })
    }

    pub fn sub(template: &str) -> Value {
        json!({ "Fn::Sub": template })
    }

    pub fn partition() -> Value {
        reference("AWS::Partition")
    }

    pub fn region() -> Value {
        reference("AWS::Region")
    }

    pub fn account_id() -> Value {
        reference("AWS::AccountId")
    }
}

/// Derive a template logical id from a construct id.
///
/// Non-alphanumeric characters split the id into words and each word is
/// capitalised, so `my-site-bucket` becomes `MySiteBucket`. The mapping is
/// pure, which keeps repeated syntheses identical.
pub fn logical_id(construct_id: &str) -> String {
    construct_id
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Construct id for a resource whose name comes from configuration.
///
/// Configured names are nested under a fixed scope, so they can never map
/// onto a fixed construct id (`alias-record` stays clear of `AliasRecord`).
pub fn scoped_id(scope: &str, name: &str) -> String {
    format!("{}/{}", scope, name)
}

/// One declared resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<RemovalPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<RemovalPolicy>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties: Map::new(),
            depends_on: BTreeSet::new(),
            update_replace_policy: None,
            deletion_policy: None,
        }
    }

    /// Set the properties block. Non-object values are ignored.
    pub fn with_properties(mut self, properties: Value) -> Self {
        if let Value::Object(map) = properties {
            self.properties = map;
        }
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.update_replace_policy = Some(policy);
        self.deletion_policy = Some(policy);
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// Stack output shown to operators after deployment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: Value,
}

impl Output {
    pub fn new(value: Value) -> Self {
        Self {
            description: None,
            value,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// IAM policy statement. Only `Allow` statements are ever declared here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    #[serde(serialize_with = "one_or_many")]
    pub action: Vec<String>,
    pub effect: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Value>,
    #[serde(serialize_with = "one_or_many")]
    pub resource: Vec<Value>,
}

impl PolicyStatement {
    pub fn allow<S: AsRef<str>>(actions: &[S], resources: Vec<Value>) -> Self {
        Self {
            action: actions.iter().map(|a| a.as_ref().to_string()).collect(),
            effect: "Allow",
            principal: None,
            resource: resources,
        }
    }

    pub fn with_principal(mut self, principal: Value) -> Self {
        self.principal = Some(principal);
        self
    }
}

/// Serialise single-element lists as a bare value, like hand-written policies.
#[allow(clippy::ptr_arg)]
fn one_or_many<T, S>(items: &Vec<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match items.as_slice() {
        [single] => single.serialize(serializer),
        many => many.serialize(serializer),
    }
}

/// Wrap statements into a policy document value.
pub fn policy_document(statements: &[PolicyStatement]) -> Value {
    json!({
        "Statement": statements,
        "Version": "2012-10-17",
    })
}

/// Trust policy letting one service principal assume a role.
pub fn assume_role_policy(service: &str) -> Value {
    json!({
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Effect": "Allow",
            "Principal": { "Service": service },
        }],
        "Version": "2012-10-17",
    })
}
