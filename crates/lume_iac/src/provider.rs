//! Provider-level definitions shared by every builder.

use serde::{Deserialize, Serialize};

use lume_config::EnvironmentConfig;

/// Cloud assembly schema version written to manifests.
pub const CLOUD_ASSEMBLY_VERSION: &str = "36.0.0";

/// Qualifier of the bootstrap resources that receive file assets.
pub const BOOTSTRAP_QUALIFIER: &str = "hnb659fds";

/// Hosted zone id CloudFront alias targets always live in.
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// Managed "CachingOptimized" cache policy.
pub const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

/// Target account and region of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AwsEnvironment {
    pub account: String,
    pub region: String,
}

impl AwsEnvironment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }

    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self::new(&config.account, &config.region)
    }

    /// `aws://<account>/<region>` as used in assembly manifests.
    pub fn as_uri(&self) -> String {
        format!("aws://{}/{}", self.account, self.region)
    }

    /// Bucket the bootstrap stack provisions for file assets.
    pub fn asset_bucket_name(&self) -> String {
        format!(
            "cdk-{}-assets-{}-{}",
            BOOTSTRAP_QUALIFIER, self.account, self.region
        )
    }

    /// Role that publishes file assets into the asset bucket.
    pub fn file_publishing_role_arn(&self) -> String {
        format!(
            "arn:${{AWS::Partition}}:iam::{}:role/cdk-{}-file-publishing-role-{}-{}",
            self.account, BOOTSTRAP_QUALIFIER, self.account, self.region
        )
    }
}

impl std::fmt::Display for AwsEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_uri())
    }
}

/// What happens to a resource when its stack is torn down or it is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalPolicy {
    #[serde(rename = "Delete")]
    Destroy,
    Retain,
}

impl RemovalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
        }
    }
}

/// CloudFront edge location coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceClass {
    #[serde(rename = "PriceClass_100")]
    PriceClass100,
    #[serde(rename = "PriceClass_200")]
    PriceClass200,
    #[serde(rename = "PriceClass_All")]
    All,
}

impl PriceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceClass::PriceClass100 => "PriceClass_100",
            PriceClass::PriceClass200 => "PriceClass_200",
            PriceClass::All => "PriceClass_All",
        }
    }
}

/// How CloudFront treats plain HTTP viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerProtocolPolicy {
    AllowAll,
    HttpsOnly,
    RedirectToHttps,
}

impl ViewerProtocolPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewerProtocolPolicy::AllowAll => "allow-all",
            ViewerProtocolPolicy::HttpsOnly => "https-only",
            ViewerProtocolPolicy::RedirectToHttps => "redirect-to-https",
        }
    }
}
