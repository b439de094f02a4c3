//! Settings document loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::environment::EnvironmentConfig;
use crate::error::{ConfigError, ConfigResult};

/// Environments the entry point loads when none are named explicitly.
pub const DEFAULT_ENVIRONMENTS: [&str; 2] = ["dev", "prod"];

/// Parsed settings document: a shared stack name plus one section per
/// environment.
#[derive(Debug, Clone)]
pub struct Settings {
    stack_name: String,
    sections: BTreeMap<String, serde_yaml::Value>,
    source: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    stack: RawStack,
    #[serde(flatten)]
    sections: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawStack {
    name: String,
}

impl Settings {
    /// Read and parse a settings file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        debug!("Reading settings from {:?}", path);
        let content = fs::read_to_string(path)?;
        let mut settings = Self::from_yaml_str(&content)?;
        settings.source = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Parse settings from YAML text.
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let raw: RawSettings = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::InvalidDocument(e.to_string()))?;

        Ok(Self {
            stack_name: raw.stack.name,
            sections: raw.sections,
            source: None,
        })
    }

    /// Stack name shared by every environment.
    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    /// File these settings were read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Names of all environment sections, sorted.
    pub fn environment_names(&self) -> Vec<&str> {
        self.sections.keys().map(String::as_str).collect()
    }

    /// Resolve one environment section into a fully populated record.
    pub fn environment(&self, name: &str) -> ConfigResult<EnvironmentConfig> {
        let section = self
            .sections
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::EnvironmentNotFound(name.to_string()))?;

        EnvironmentConfig::from_section(name, &self.stack_name, section).map_err(|e| {
            ConfigError::InvalidEnvironment {
                environment: name.to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Resolve several environments in order, failing on the first bad one.
    pub fn environments<S: AsRef<str>>(&self, names: &[S]) -> ConfigResult<Vec<EnvironmentConfig>> {
        names
            .iter()
            .map(|name| self.environment(name.as_ref()))
            .collect()
    }
}
