//! Lookups against provider state that already exists.
//!
//! Lookups never create anything. Their answers are read from a context
//! file (the `cdk.context.json` layout) so a synthesis is reproducible
//! offline; a missing answer fails the synthesis.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{IacError, IacResult};

/// Query identifying a hosted zone by its domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostedZoneQuery {
    pub account: String,
    pub region: String,
    pub domain_name: String,
}

impl HostedZoneQuery {
    pub fn new(
        account: impl Into<String>,
        region: impl Into<String>,
        domain_name: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
            domain_name: domain_name.into(),
        }
    }

    /// Context key the answer is cached under.
    pub fn context_key(&self) -> String {
        format!(
            "hosted-zone:account={}:domainName={}:region={}",
            self.account, self.domain_name, self.region
        )
    }
}

/// Hosted zone as cached in the context file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    /// Full id, e.g. `/hostedzone/Z123ABC`.
    #[serde(rename = "Id")]
    pub id: String,
    /// Zone name with trailing dot.
    #[serde(rename = "Name")]
    pub name: String,
}

impl HostedZone {
    /// Zone id without the `/hostedzone/` prefix, as record sets expect it.
    pub fn zone_id(&self) -> &str {
        self.id.strip_prefix("/hostedzone/").unwrap_or(&self.id)
    }
}

/// Source of answers for provider lookups.
pub trait ContextProvider {
    /// Resolve an existing hosted zone.
    fn hosted_zone(&self, query: &HostedZoneQuery) -> IacResult<HostedZone>;
}

/// Context values loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct ContextFile {
    path: Option<PathBuf>,
    entries: Map<String, Value>,
}

impl ContextFile {
    /// Empty context; every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a context file. A file that does not exist yields an empty context.
    pub fn load(path: impl AsRef<Path>) -> IacResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No context file at {:?}, starting empty", path);
            return Ok(Self {
                path: Some(path.to_path_buf()),
                entries: Map::new(),
            });
        }

        let content = fs::read_to_string(path)?;
        let mut context = Self::from_json_str(&content)?;
        context.path = Some(path.to_path_buf());
        Ok(context)
    }

    pub fn from_json_str(content: &str) -> IacResult<Self> {
        let entries: Map<String, Value> = serde_json::from_str(content)?;
        Ok(Self { path: None, entries })
    }

    /// Record a hosted zone answer.
    pub fn with_hosted_zone(mut self, query: &HostedZoneQuery, zone_id: &str) -> Self {
        let zone = HostedZone {
            id: format!("/hostedzone/{}", zone_id),
            name: format!("{}.", query.domain_name.trim_end_matches('.')),
        };
        if let Ok(value) = serde_json::to_value(zone) {
            self.entries.insert(query.context_key(), value);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn missing(&self, key: String) -> IacError {
        let location = self
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<in-memory context>".to_string());
        IacError::LookupFailed {
            key,
            message: format!("no cached value in {}", location),
        }
    }
}

impl ContextProvider for ContextFile {
    fn hosted_zone(&self, query: &HostedZoneQuery) -> IacResult<HostedZone> {
        let key = query.context_key();
        debug!("Looking up {}", key);

        let value = self.entries.get(&key).cloned().ok_or_else(|| self.missing(key.clone()))?;
        serde_json::from_value(value).map_err(|e| IacError::LookupFailed {
            key,
            message: format!("malformed hosted zone entry: {}", e),
        })
    }
}
