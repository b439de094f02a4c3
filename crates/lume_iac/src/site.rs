//! Site hosting builders: web bucket, CDN distribution and DNS alias.

use serde_json::{json, Value};
use tracing::info;

use lume_config::EnvironmentConfig;

use crate::context::{ContextProvider, HostedZoneQuery};
use crate::error::IacResult;
use crate::provider::{
    PriceClass, RemovalPolicy, ViewerProtocolPolicy, CACHING_OPTIMIZED_POLICY_ID,
    CLOUDFRONT_HOSTED_ZONE_ID,
};
use crate::stack::Stack;
use crate::template::{cfn, logical_id, policy_document, scoped_id, PolicyStatement, Resource};

/// Object CloudFront serves for `/`.
pub const DEFAULT_ROOT_OBJECT: &str = "index.html";

/// Construct id of the origin-access identity.
const OAI_ID: &str = "OAI";
/// Construct id of the DNS alias record.
const ALIAS_RECORD_ID: &str = "AliasRecord";

/// Mapping of an origin error to what viewers receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    pub http_status: u16,
    pub response_http_status: u16,
    pub response_page_path: &'static str,
    /// Seconds CloudFront caches the error before asking the origin again.
    pub ttl_seconds: u32,
}

/// 404 keeps its status and page; 403 (missing key behind the identity)
/// falls back to the app shell with a 500.
pub const ERROR_RESPONSES: [ErrorResponse; 2] = [
    ErrorResponse {
        http_status: 404,
        response_http_status: 404,
        response_page_path: "/404.html",
        ttl_seconds: 300,
    },
    ErrorResponse {
        http_status: 403,
        response_http_status: 500,
        response_page_path: "/index.html",
        ttl_seconds: 300,
    },
];

impl ErrorResponse {
    fn to_value(self) -> Value {
        json!({
            "ErrorCachingMinTTL": self.ttl_seconds,
            "ErrorCode": self.http_status,
            "ResponseCode": self.response_http_status,
            "ResponsePagePath": self.response_page_path,
        })
    }
}

/// Static-file bucket declared in a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketHandle {
    logical_id: String,
}

impl BucketHandle {
    pub fn new(logical_id: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
        }
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Logical id of the bucket policy, created on first statement.
    pub fn policy_logical_id(&self) -> String {
        format!("{}Policy", self.logical_id)
    }

    pub fn bucket_name(&self) -> Value {
        cfn::reference(&self.logical_id)
    }

    pub fn arn(&self) -> Value {
        cfn::get_att(&self.logical_id, "Arn")
    }

    /// ARN matching objects under the bucket, e.g. `arn_for_objects("*")`.
    pub fn arn_for_objects(&self, pattern: &str) -> Value {
        cfn::join("", vec![self.arn(), json!(format!("/{}", pattern))])
    }

    pub fn regional_domain_name(&self) -> Value {
        cfn::get_att(&self.logical_id, "RegionalDomainName")
    }

    pub fn website_url(&self) -> Value {
        cfn::get_att(&self.logical_id, "WebsiteURL")
    }

    /// Append a statement to the bucket's resource policy.
    pub fn add_to_resource_policy(
        &self,
        stack: &mut Stack,
        statement: PolicyStatement,
    ) -> IacResult<()> {
        let policy_id = self.policy_logical_id();

        if !stack.contains(&policy_id) {
            let policy = Resource::new("AWS::S3::BucketPolicy").with_properties(json!({
                "Bucket": self.bucket_name(),
                "PolicyDocument": policy_document(&[statement]),
            }));
            stack.add_resource(&policy_id, policy)?;
            return Ok(());
        }

        let statement = serde_json::to_value(statement)?;
        let policy = stack.resource_mut(&policy_id)?;
        if let Some(Value::Array(statements)) = policy
            .properties
            .get_mut("PolicyDocument")
            .and_then(|doc| doc.get_mut("Statement"))
        {
            statements.push(statement);
        }
        Ok(())
    }
}

/// CDN distribution declared in a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionHandle {
    logical_id: String,
    identity_id: String,
    domain_names: Vec<String>,
}

impl DistributionHandle {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Logical id of the origin-access identity serving this distribution.
    pub fn identity_logical_id(&self) -> &str {
        &self.identity_id
    }

    pub fn distribution_id(&self) -> Value {
        cfn::reference(&self.logical_id)
    }

    /// CloudFront-assigned domain (`dxxxx.cloudfront.net`).
    pub fn domain_name(&self) -> Value {
        cfn::get_att(&self.logical_id, "DomainName")
    }

    /// Custom names the distribution answers on.
    pub fn domain_names(&self) -> &[String] {
        &self.domain_names
    }
}

/// DNS alias record declared in a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHandle {
    logical_id: String,
    record_name: String,
}

impl RecordHandle {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn record_name(&self) -> &str {
        &self.record_name
    }
}

/// Declare the static-file bucket.
///
/// The removal policy is always destroy, ACLs are blocked while bucket
/// policies stay allowed, and objects are encrypted with S3-managed keys.
/// With `public_access` the bucket policy grants anonymous reads so the
/// website endpoint serves content.
pub fn web_bucket(stack: &mut Stack, config: &EnvironmentConfig) -> IacResult<BucketHandle> {
    let bucket = Resource::new("AWS::S3::Bucket")
        .with_properties(json!({
            "AccessControl": "BucketOwnerFullControl",
            "BucketEncryption": {
                "ServerSideEncryptionConfiguration": [{
                    "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" }
                }]
            },
            "BucketName": config.bucket_name,
            "OwnershipControls": {
                "Rules": [{ "ObjectOwnership": "ObjectWriter" }]
            },
            "PublicAccessBlockConfiguration": {
                "BlockPublicAcls": true,
                "BlockPublicPolicy": false,
                "IgnorePublicAcls": true,
                "RestrictPublicBuckets": false,
            },
            "WebsiteConfiguration": {
                "ErrorDocument": config.error_file,
                "IndexDocument": config.index_file,
            },
        }))
        .with_removal_policy(RemovalPolicy::Destroy);

    let handle = BucketHandle::new(stack.add_resource(&scoped_id("WebBucket", &config.bucket_name), bucket)?);

    if config.public_access {
        let statement = PolicyStatement::allow(&["s3:GetObject"], vec![handle.arn_for_objects("*")])
            .with_principal(json!({ "AWS": "*" }));
        handle.add_to_resource_policy(stack, statement)?;
    }

    info!("Declared web bucket {}", config.bucket_name);
    Ok(handle)
}

/// Declare the CDN distribution in front of `bucket`.
///
/// Reads go through an origin-access identity that is granted
/// `s3:GetObject` on the bucket's objects and nothing else. The
/// certificate is referenced by ARN and must already exist.
pub fn distribution(
    stack: &mut Stack,
    bucket: &BucketHandle,
    config: &EnvironmentConfig,
) -> IacResult<DistributionHandle> {
    let construct_id = scoped_id("Distribution", &config.pipeline_name);

    let identity = Resource::new("AWS::CloudFront::CloudFrontOriginAccessIdentity").with_properties(
        json!({
            "CloudFrontOriginAccessIdentityConfig": {
                "Comment": format!("Identity for {}-deployment-distribution", config.pipeline_name)
            }
        }),
    );
    let identity_id = stack.add_resource(OAI_ID, identity)?;

    let statement = PolicyStatement::allow(&["s3:GetObject"], vec![bucket.arn_for_objects("*")])
        .with_principal(json!({
            "CanonicalUser": cfn::get_att(&identity_id, "S3CanonicalUserId")
        }));
    bucket.add_to_resource_policy(stack, statement)?;

    let site_domain = config.site_domain();
    let origin_id = format!("{}Origin1", logical_id(&construct_id));
    let error_responses: Vec<Value> = ERROR_RESPONSES.iter().map(|r| r.to_value()).collect();

    let distribution = Resource::new("AWS::CloudFront::Distribution").with_properties(json!({
        "DistributionConfig": {
            "Aliases": [site_domain],
            "CustomErrorResponses": error_responses,
            "DefaultCacheBehavior": {
                "CachePolicyId": CACHING_OPTIMIZED_POLICY_ID,
                "Compress": true,
                "TargetOriginId": origin_id,
                "ViewerProtocolPolicy": ViewerProtocolPolicy::RedirectToHttps.as_str(),
            },
            "DefaultRootObject": DEFAULT_ROOT_OBJECT,
            "Enabled": true,
            "HttpVersion": "http2",
            "IPV6Enabled": true,
            "Origins": [{
                "DomainName": bucket.regional_domain_name(),
                "Id": origin_id,
                "S3OriginConfig": {
                    "OriginAccessIdentity": cfn::join("", vec![
                        json!("origin-access-identity/cloudfront/"),
                        cfn::reference(&identity_id),
                    ])
                }
            }],
            "PriceClass": PriceClass::PriceClass100.as_str(),
            "ViewerCertificate": {
                "AcmCertificateArn": config.certificate_arn,
                "MinimumProtocolVersion": "TLSv1.2_2021",
                "SslSupportMethod": "sni-only",
            },
        }
    }));

    let id = stack.add_resource(&construct_id, distribution)?;
    info!("Declared distribution {} for {}", id, site_domain);

    Ok(DistributionHandle {
        logical_id: id,
        identity_id,
        domain_names: vec![site_domain],
    })
}

/// Declare the alias record pointing `{subdomain}.{domain}` at the distribution.
///
/// The hosted zone is looked up, never created; an unknown zone fails the
/// synthesis.
pub fn alias_record(
    stack: &mut Stack,
    config: &EnvironmentConfig,
    distribution: &DistributionHandle,
    context: &dyn ContextProvider,
) -> IacResult<RecordHandle> {
    let query = HostedZoneQuery::new(&config.account, &config.region, &config.domain_name);
    let zone = context.hosted_zone(&query)?;

    let record_name = format!("{}.", config.site_domain());
    let record = Resource::new("AWS::Route53::RecordSet").with_properties(json!({
        "AliasTarget": {
            "DNSName": distribution.domain_name(),
            "HostedZoneId": CLOUDFRONT_HOSTED_ZONE_ID,
        },
        "HostedZoneId": zone.zone_id(),
        "Name": record_name,
        "Type": "A",
    }));

    let id = stack.add_resource(ALIAS_RECORD_ID, record)?;
    stack.add_dependency(&id, distribution.logical_id())?;

    Ok(RecordHandle {
        logical_id: id,
        record_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextFile;
    use crate::provider::AwsEnvironment;
    use crate::testing::sample_config;

    fn stack() -> Stack {
        Stack::new("SiteStack", AwsEnvironment::new("123456789012", "us-east-1"))
    }

    fn policy_statements(stack: &Stack, bucket: &BucketHandle) -> Vec<Value> {
        stack
            .resource(&bucket.policy_logical_id())
            .and_then(|p| p.property("PolicyDocument"))
            .and_then(|doc| doc["Statement"].as_array().cloned())
            .unwrap_or_default()
    }

    #[test]
    fn test_bucket_is_always_destroyed_on_teardown() {
        for public_access in [true, false] {
            let mut config = sample_config();
            config.public_access = public_access;

            let mut stack = stack();
            let bucket = web_bucket(&mut stack, &config).unwrap();
            let resource = stack.resource(bucket.logical_id()).unwrap();

            assert_eq!(resource.deletion_policy, Some(RemovalPolicy::Destroy));
            assert_eq!(resource.update_replace_policy, Some(RemovalPolicy::Destroy));
            assert_eq!(resource.property("AccessControl"), Some(&json!("BucketOwnerFullControl")));
            assert_eq!(
                resource.property("BucketEncryption").unwrap()["ServerSideEncryptionConfiguration"][0]
                    ["ServerSideEncryptionByDefault"]["SSEAlgorithm"],
                json!("AES256")
            );
        }
    }

    #[test]
    fn test_public_bucket_is_reachable_through_website_endpoint() {
        let config = sample_config();
        let mut stack = stack();
        let bucket = web_bucket(&mut stack, &config).unwrap();

        let resource = stack.resource(bucket.logical_id()).unwrap();
        let block = resource.property("PublicAccessBlockConfiguration").unwrap();
        assert_eq!(block["BlockPublicAcls"], json!(true));
        assert_eq!(block["BlockPublicPolicy"], json!(false));
        assert_eq!(block["RestrictPublicBuckets"], json!(false));
        assert_eq!(
            resource.property("WebsiteConfiguration").unwrap()["IndexDocument"],
            json!("index.html")
        );

        let statements = policy_statements(&stack, &bucket);
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0]["Principal"], json!({ "AWS": "*" }));
        assert_eq!(statements[0]["Action"], json!("s3:GetObject"));
    }

    #[test]
    fn test_private_bucket_has_no_policy_until_distribution() {
        let mut config = sample_config();
        config.public_access = false;

        let mut stack = stack();
        let bucket = web_bucket(&mut stack, &config).unwrap();
        assert!(!stack.contains(&bucket.policy_logical_id()));

        distribution(&mut stack, &bucket, &config).unwrap();
        assert_eq!(policy_statements(&stack, &bucket).len(), 1);
    }

    #[test]
    fn test_identity_statement_is_scoped_to_bucket_objects() {
        let mut config = sample_config();
        config.public_access = false;

        let mut stack = stack();
        let bucket = web_bucket(&mut stack, &config).unwrap();
        let dist = distribution(&mut stack, &bucket, &config).unwrap();

        let statements = policy_statements(&stack, &bucket);
        assert_eq!(statements.len(), 1);
        let statement = &statements[0];

        assert_eq!(statement["Action"], json!("s3:GetObject"));
        assert_eq!(statement["Resource"], bucket.arn_for_objects("*"));
        assert_eq!(
            statement["Principal"],
            json!({ "CanonicalUser": cfn::get_att(dist.identity_logical_id(), "S3CanonicalUserId") })
        );
    }

    #[test]
    fn test_distribution_error_pages_and_aliases() {
        let config = sample_config();
        let mut stack = stack();
        let bucket = web_bucket(&mut stack, &config).unwrap();
        let dist = distribution(&mut stack, &bucket, &config).unwrap();

        let resource = stack.resource(dist.logical_id()).unwrap();
        let dist_config = resource.property("DistributionConfig").unwrap();

        assert_eq!(dist_config["Aliases"], json!(["www.example.com"]));
        assert_eq!(dist_config["DefaultRootObject"], json!("index.html"));
        assert_eq!(dist_config["PriceClass"], json!("PriceClass_100"));
        assert_eq!(
            dist_config["DefaultCacheBehavior"]["ViewerProtocolPolicy"],
            json!("redirect-to-https")
        );
        assert_eq!(
            dist_config["ViewerCertificate"]["AcmCertificateArn"],
            json!(config.certificate_arn)
        );

        let errors = dist_config["CustomErrorResponses"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["ErrorCode"], json!(404));
        assert_eq!(errors[0]["ResponseCode"], json!(404));
        assert_eq!(errors[0]["ResponsePagePath"], json!("/404.html"));
        assert_eq!(errors[1]["ErrorCode"], json!(403));
        assert_eq!(errors[1]["ResponseCode"], json!(500));
        assert_eq!(errors[1]["ResponsePagePath"], json!("/index.html"));
        assert!(errors.iter().all(|e| e["ErrorCachingMinTTL"] == json!(300)));
    }

    #[test]
    fn test_alias_record_depends_on_distribution() {
        let config = sample_config();
        let context = ContextFile::new().with_hosted_zone(
            &HostedZoneQuery::new(&config.account, &config.region, &config.domain_name),
            "ZONE123",
        );

        let mut stack = stack();
        let bucket = web_bucket(&mut stack, &config).unwrap();
        let dist = distribution(&mut stack, &bucket, &config).unwrap();
        let record = alias_record(&mut stack, &config, &dist, &context).unwrap();

        let resource = stack.resource(record.logical_id()).unwrap();
        assert!(resource.depends_on.contains(dist.logical_id()));
        assert_eq!(resource.property("HostedZoneId"), Some(&json!("ZONE123")));
        assert_eq!(resource.property("Name"), Some(&json!("www.example.com.")));
        assert_eq!(resource.property("AliasTarget").unwrap()["DNSName"], dist.domain_name());
        assert_eq!(record.record_name(), "www.example.com.");
    }

    #[test]
    fn test_alias_record_fails_without_zone() {
        let config = sample_config();
        let mut stack = stack();
        let bucket = web_bucket(&mut stack, &config).unwrap();
        let dist = distribution(&mut stack, &bucket, &config).unwrap();

        assert!(alias_record(&mut stack, &config, &dist, &ContextFile::new()).is_err());
    }
}
