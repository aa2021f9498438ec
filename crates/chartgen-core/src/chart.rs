//! Chart.yaml descriptor
//!
//! Built from the chart configuration on every build. Optional fields are
//! omitted from the serialized document when unset or empty.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::config::ChartConfig;
use crate::error::Result;

/// Helm chart descriptor (Chart.yaml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDescriptor {
    pub api_version: String,

    pub name: String,

    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ChartDependency>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub annotations: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

/// Dependency entry of the descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDependency {
    pub name: String,

    pub alias: String,

    pub version: String,

    pub repository: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    pub enabled: bool,
}

/// Maintainer information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ChartDescriptor {
    /// Build the descriptor of a chart
    pub fn from_config(config: &ChartConfig, default_version: &str) -> Self {
        let dependencies = config
            .dependencies
            .iter()
            .map(|d| ChartDependency {
                name: d.name.clone(),
                alias: d
                    .alias
                    .clone()
                    .filter(|alias| !alias.is_empty())
                    .unwrap_or_else(|| d.name.clone()),
                version: d.version.clone(),
                repository: d.repository.clone(),
                condition: d.condition.clone(),
                tags: d.tags.clone(),
                enabled: d.enabled,
            })
            .collect();

        Self {
            api_version: config.api_version.clone(),
            name: config.name.clone(),
            version: config.resolve_version(default_version),
            kube_version: config.kube_version.clone(),
            description: config.description.clone(),
            chart_type: config.chart_type.clone(),
            keywords: config.keywords.clone(),
            home: config.home.clone(),
            sources: config.sources.clone(),
            dependencies,
            maintainers: config.maintainers.clone(),
            icon: config.icon.clone(),
            app_version: config.app_version.clone(),
            deprecated: config.deprecated,
            annotations: config.annotations.clone(),
            condition: config.condition.clone(),
            tags: config.tags.clone(),
        }
    }

    /// Generic YAML tree of this descriptor, used for merging with a user file
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_yaml::to_value(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
