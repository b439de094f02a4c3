//! Per-environment configuration record.

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};

/// Everything one deployment target needs to declare its stack.
///
/// Built once by [`crate::Settings::environment`] and passed by reference
/// afterwards; nothing mutates it after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentConfig {
    /// Key of the section this record was read from (`dev`, `prod`, ...).
    pub name: String,
    pub account: String,
    pub region: String,
    /// Whether the entry point should instantiate a stack for this environment.
    pub is_deploy: bool,
    pub stack_name: String,
    pub environment_type: String,
    pub branch: String,
    pub pipeline_name: String,
    pub bucket_name: String,
    /// Artifact store bucket for the release pipeline.
    pub pipeline_bucket: String,
    pub public_access: bool,
    pub index_file: String,
    pub error_file: String,
    pub github_repo_owner: String,
    pub github_repo_name: String,
    /// Name of the stored secret holding the repository token, never the token itself.
    pub github_access_token: String,
    pub domain_name: String,
    pub subdomain_name: String,
    pub certificate_arn: String,
    /// Empty when no notification hook should be attached.
    pub discord_webhook_url: String,
}

impl EnvironmentConfig {
    /// Fully qualified name the distribution answers on.
    pub fn site_domain(&self) -> String {
        format!("{}.{}", self.subdomain_name, self.domain_name)
    }

    /// Whether a pipeline notification hook is configured.
    pub fn has_webhook(&self) -> bool {
        !self.discord_webhook_url.is_empty()
    }

    pub(crate) fn from_section(
        name: &str,
        stack_name: &str,
        section: serde_yaml::Value,
    ) -> Result<Self, serde_yaml::Error> {
        let raw: RawEnvironment = serde_yaml::from_value(section)?;

        Ok(Self {
            name: name.to_string(),
            account: raw.account,
            region: raw.region,
            is_deploy: raw.deploy,
            stack_name: stack_name.to_string(),
            environment_type: raw.environment_type,
            branch: raw.branch_name,
            pipeline_name: raw.pipeline_config.name,
            bucket_name: raw.s3_config.bucket_name,
            pipeline_bucket: raw.s3_config.artifacts_bucket,
            public_access: raw.s3_config.public_access,
            index_file: raw.s3_config.index_file,
            error_file: raw.s3_config.error_file,
            github_repo_owner: raw.github_repo_owner,
            github_repo_name: raw.github_repo_name,
            github_access_token: raw.github_access_token_name,
            domain_name: raw.domain_name,
            subdomain_name: raw.subdomain_name,
            certificate_arn: raw.certificate_arn,
            discord_webhook_url: raw.discord_webhook_url,
        })
    }
}

/// Environment section as it appears in the settings file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvironment {
    #[serde(deserialize_with = "scalar_string")]
    account: String,
    region: String,
    deploy: bool,
    environment_type: String,
    branch_name: String,
    pipeline_config: RawPipelineConfig,
    s3_config: RawS3Config,
    github_repo_owner: String,
    github_repo_name: String,
    github_access_token_name: String,
    domain_name: String,
    subdomain_name: String,
    certificate_arn: String,
    #[serde(rename = "discordWebhookURL", deserialize_with = "nullable_string")]
    discord_webhook_url: String,
}

#[derive(Debug, Deserialize)]
struct RawPipelineConfig {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawS3Config {
    bucket_name: String,
    artifacts_bucket: String,
    public_access: bool,
    index_file: String,
    error_file: String,
}

/// Accepts a string or integer scalar as a string, so account ids
/// may be written unquoted. Non-integer numbers are rejected.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) if n.is_u64() || n.is_i64() => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or integer, found {:?}",
            other
        ))),
    }
}

/// The key must be present, but an empty YAML value reads as "".
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTION: &str = r#"
account: 123456789012
region: us-east-1
deploy: true
environmentType: production
branchName: main
pipelineConfig:
  name: site-pipeline
s3Config:
  bucketName: site-bucket
  artifactsBucket: site-artifacts
  publicAccess: true
  indexFile: index.html
  errorFile: 404.html
githubRepoOwner: acme
githubRepoName: site
githubAccessTokenName: github-token
domainName: example.com
subdomainName: www
certificateArn: arn:aws:acm:us-east-1:123456789012:certificate/abc
discordWebhookURL:
"#;

    fn section() -> serde_yaml::Value {
        serde_yaml::from_str(SECTION).unwrap()
    }

    #[test]
    fn test_numeric_account_is_read_as_string() {
        let env = EnvironmentConfig::from_section("prod", "SiteStack", section()).unwrap();
        assert_eq!(env.account, "123456789012");
    }

    #[test]
    fn test_non_integer_account_is_rejected() {
        let mut value = section();
        value["account"] = serde_yaml::from_str("1e3").unwrap();

        let err = EnvironmentConfig::from_section("prod", "SiteStack", value).unwrap_err();
        assert!(err.to_string().contains("expected a string or integer"));
    }

    #[test]
    fn test_leading_zero_account_keeps_its_digits() {
        let mut value = section();
        value["account"] = serde_yaml::from_str("012345678901").unwrap();

        let env = EnvironmentConfig::from_section("prod", "SiteStack", value).unwrap();
        assert_eq!(env.account, "012345678901");
    }

    #[test]
    fn test_null_webhook_reads_as_empty() {
        let env = EnvironmentConfig::from_section("prod", "SiteStack", section()).unwrap();
        assert_eq!(env.discord_webhook_url, "");
        assert!(!env.has_webhook());
    }

    #[test]
    fn test_missing_webhook_key_is_an_error() {
        let mut value = section();
        value
            .as_mapping_mut()
            .unwrap()
            .remove("discordWebhookURL");

        let err = EnvironmentConfig::from_section("prod", "SiteStack", value).unwrap_err();
        assert!(err.to_string().contains("discordWebhookURL"));
    }

    #[test]
    fn test_site_domain() {
        let env = EnvironmentConfig::from_section("prod", "SiteStack", section()).unwrap();
        assert_eq!(env.site_domain(), "www.example.com");
    }
}
