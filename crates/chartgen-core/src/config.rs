//! Chart build configuration
//!
//! `ChartConfig` is what a caller hands to the engine for one chart build:
//! the chart metadata, the value references to expose, the conditional
//! inclusion rules, raw expression overrides and packaging options.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;

use crate::chart::Maintainer;
use crate::error::{CoreError, Result};

/// Notes template shipped with the embedded resources
pub const DEFAULT_NOTES: &str = "/NOTES.template.txt";

/// Properties under this group are resolved after all the other properties
pub const ENVIRONMENT_PROPERTY_GROUP: &str = "envs.";

const VALUES_PREFIX: &str = ".Values.";

/// Configuration of a single chart build
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    /// Disabled configurations produce no output at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Chart name (required)
    #[serde(default)]
    pub name: String,

    /// Chart version. When unset, the caller-supplied version is used.
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub home: Option<String>,

    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub maintainers: Vec<Maintainer>,

    #[serde(default)]
    pub icon: Option<String>,

    /// Chart API version (v2 for Helm 3)
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default)]
    pub condition: Option<String>,

    #[serde(default)]
    pub tags: Option<String>,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub deprecated: bool,

    #[serde(default)]
    pub annotations: IndexMap<String, String>,

    #[serde(default)]
    pub kube_version: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,

    /// Chart type (application or library)
    #[serde(default, rename = "type")]
    pub chart_type: Option<String>,

    /// Value references declared directly in the configuration
    #[serde(default)]
    pub values: Vec<ValueReference>,

    /// Raw expressions applied after the value references
    #[serde(default)]
    pub expressions: Vec<HelmExpression>,

    /// Resources wrapped in `{{- if .Values.<property> }}` blocks
    #[serde(default)]
    pub add_if_statements: Vec<AddIfStatement>,

    /// Logical name of the notes template
    #[serde(default = "default_notes")]
    pub notes: Option<String>,

    /// Archive extension (tar.gz, tgz or tar)
    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default)]
    pub tar_file_classifier: Option<String>,

    /// Package the chart into an archive after writing it
    #[serde(default)]
    pub create_tar_file: bool,

    /// Root prefix prepended to every property that does not already carry it
    #[serde(default)]
    pub values_root_alias: Option<String>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: String::new(),
            version: None,
            description: None,
            home: None,
            sources: Vec::new(),
            maintainers: Vec::new(),
            icon: None,
            api_version: default_api_version(),
            condition: None,
            tags: None,
            app_version: None,
            deprecated: false,
            annotations: IndexMap::new(),
            kube_version: None,
            keywords: Vec::new(),
            dependencies: Vec::new(),
            chart_type: None,
            values: Vec::new(),
            expressions: Vec::new(),
            add_if_statements: Vec::new(),
            notes: default_notes(),
            extension: default_extension(),
            tar_file_classifier: None,
            create_tar_file: false,
            values_root_alias: None,
        }
    }
}

impl ChartConfig {
    /// Create a configuration for the given chart name with every other field defaulted
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Load a configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|source| CoreError::InvalidYamlFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check the configuration before anything is written
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::MissingChartName);
        }
        Ok(())
    }

    /// Explicit version if set, otherwise the caller's fallback
    pub fn resolve_version(&self, default_version: &str) -> String {
        match self.version.as_deref() {
            Some(version) if !version.is_empty() => version.to_string(),
            _ => default_version.to_string(),
        }
    }

    /// Name of the packaged archive: `<name>-<version>[-<classifier>].<extension>`
    pub fn archive_file_name(&self, default_version: &str) -> String {
        let classifier = match self.tar_file_classifier.as_deref() {
            Some(classifier) if !classifier.is_empty() => format!("-{}", classifier),
            _ => String::new(),
        };
        format!(
            "{}-{}{}.{}",
            self.name,
            self.resolve_version(default_version),
            classifier,
            self.extension
        )
    }

    /// Turn a declared property into the dotted path used under `.Values`
    ///
    /// A leading `.Values.` is dropped and the values root alias, when
    /// configured, is prepended unless the property already starts with it.
    pub fn deduce_property(&self, property: &str) -> String {
        let property = property.strip_prefix(VALUES_PREFIX).unwrap_or(property);

        match self.values_root_alias.as_deref() {
            Some(alias)
                if !alias.is_empty()
                    && property != alias
                    && !property
                        .strip_prefix(alias)
                        .is_some_and(|rest| rest.starts_with('.')) =>
            {
                format!("{}.{}", alias, property)
            }
            _ => property.to_string(),
        }
    }

    /// Build the ordered list of value references for a chart build
    ///
    /// Order: references declared in this configuration, then one boolean
    /// reference per conditional inclusion rule, then the discovered
    /// references with the most recently applied first.
    pub fn value_references(&self, discovered: Vec<ValueReference>) -> Vec<ValueReference> {
        let mut references = self.values.clone();

        references.extend(self.add_if_statements.iter().map(|statement| {
            ValueReference::new(&statement.property).with_value(statement.with_default_value)
        }));

        references.extend(discovered.into_iter().rev());
        references
    }
}

/// A configuration property exposed as a chart value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueReference {
    /// Dotted property name in the values document
    pub property: String,

    /// Explicit default value
    #[serde(default)]
    pub value: Option<Value>,

    /// Expression injected instead of `{{ .Values.<property> }}`
    #[serde(default)]
    pub expression: Option<String>,

    /// YAML paths rewritten to reference this value
    #[serde(default)]
    pub paths: Vec<String>,

    /// Profile the value belongs to; unset means the default profile
    #[serde(default)]
    pub profile: Option<String>,

    #[serde(default)]
    pub on_resource_kind: Option<String>,

    #[serde(default)]
    pub on_resource_name: Option<String>,
}

impl ValueReference {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn on_resource(mut self, kind: Option<&str>, name: Option<&str>) -> Self {
        self.on_resource_kind = kind.map(str::to_string);
        self.on_resource_name = name.map(str::to_string);
        self
    }

    #[inline]
    pub fn has_paths(&self) -> bool {
        !self.paths.is_empty()
    }

    /// Profile name, empty for the default profile
    #[inline]
    pub fn profile(&self) -> &str {
        self.profile.as_deref().unwrap_or_default()
    }

    pub fn is_environment_property(&self) -> bool {
        self.property.contains(ENVIRONMENT_PROPERTY_GROUP)
    }

    /// Part of the property following the environment group
    ///
    /// `app.envs.DB_URL` gives `DB_URL`. Properties outside the group are
    /// returned unchanged.
    pub fn environment_property_name(&self) -> &str {
        match self.property.find(ENVIRONMENT_PROPERTY_GROUP) {
            Some(index) => &self.property[index + ENVIRONMENT_PROPERTY_GROUP.len()..],
            None => &self.property,
        }
    }

    /// Whether this reference targets a resource with the given kind and name
    pub fn applies_to(&self, kind: Option<&str>, name: Option<&str>) -> bool {
        matches_filter(self.on_resource_kind.as_deref(), kind)
            && matches_filter(self.on_resource_name.as_deref(), name)
    }
}

/// Chart dependency as declared in the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyConfig {
    pub name: String,

    /// Alias, defaults to the dependency name
    #[serde(default)]
    pub alias: Option<String>,

    pub version: String,

    pub repository: String,

    /// Values property enabling the dependency
    #[serde(default)]
    pub condition: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl DependencyConfig {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            alias: None,
            version: version.into(),
            repository: repository.into(),
            condition: None,
            tags: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Condition property when set and non-empty
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref().filter(|c| !c.is_empty())
    }
}

/// Raw expression set at a path after the value references were applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelmExpression {
    pub path: String,
    pub expression: String,
}

/// Rule wrapping matching resources into an `if` block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddIfStatement {
    /// Boolean property tested by the block
    pub property: String,

    /// Only resources of this kind; unset or empty matches every kind
    #[serde(default)]
    pub on_resource_kind: Option<String>,

    /// Only resources with this name; unset or empty matches every name
    #[serde(default)]
    pub on_resource_name: Option<String>,

    /// Value registered for the property
    #[serde(default = "default_true")]
    pub with_default_value: bool,
}

impl AddIfStatement {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            on_resource_kind: None,
            on_resource_name: None,
            with_default_value: true,
        }
    }

    pub fn matches(&self, kind: Option<&str>, name: Option<&str>) -> bool {
        matches_filter(self.on_resource_kind.as_deref(), kind)
            && matches_filter(self.on_resource_name.as_deref(), name)
    }
}

/// Empty-or-equal filter
fn matches_filter(filter: Option<&str>, actual: Option<&str>) -> bool {
    match filter {
        None | Some("") => true,
        Some(expected) => actual == Some(expected),
    }
}

fn default_true() -> bool {
    true
}

fn default_api_version() -> String {
    "v2".to_string()
}

fn default_notes() -> Option<String> {
    Some(DEFAULT_NOTES.to_string())
}

fn default_extension() -> String {
    "tar.gz".to_string()
}
