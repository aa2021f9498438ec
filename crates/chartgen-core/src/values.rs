//! Values accumulation, nesting and deep merge
//!
//! The values of a chart are collected as flat `property -> value` maps, one
//! per profile. The empty profile is the default (production) profile; the
//! others are overlays written to `values.<profile>.yaml`.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{ChartConfig, ValueReference};
use crate::error::{CoreError, Result};

/// Name of the default profile
pub const DEFAULT_PROFILE: &str = "";

/// Flat values of one profile, keyed by dotted property
pub type PropertyValues = BTreeMap<String, Value>;

/// Which side wins when both trees hold a non-mapping value for the same key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    /// Keep the value already in the base tree
    Base,
    /// Replace it with the overlay value
    Overlay,
}

/// Per-profile values collected during a chart build
#[derive(Debug, Clone, Default)]
pub struct ValuesAccumulator {
    prod: PropertyValues,
    profiles: BTreeMap<String, PropertyValues>,
}

impl ValuesAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the accumulator from the value references and chart dependencies
    ///
    /// References without paths must carry a value: there is nothing to read
    /// it from. Dependency conditions are registered as `true` in the default
    /// profile.
    pub fn populate(config: &ChartConfig, references: &[ValueReference]) -> Result<Self> {
        let mut values = Self::new();

        for reference in references.iter().filter(|r| !r.has_paths()) {
            let value = reference
                .value
                .clone()
                .ok_or_else(|| CoreError::IncompleteValueMapping {
                    property: reference.property.clone(),
                })?;

            values.put_if_absent(
                config.deduce_property(&reference.property),
                value,
                reference.profile(),
            );
        }

        for condition in config.dependencies.iter().filter_map(|d| d.condition()) {
            values.put(
                config.deduce_property(condition),
                Value::Bool(true),
                DEFAULT_PROFILE,
            );
        }

        Ok(values)
    }

    /// Insert a value, replacing any previous value of the property
    pub fn put(&mut self, property: impl Into<String>, value: Value, profile: &str) {
        self.get(profile).insert(property.into(), value);
    }

    /// Insert a value unless the profile already holds the property
    pub fn put_if_absent(&mut self, property: impl Into<String>, value: Value, profile: &str) {
        self.get(profile).entry(property.into()).or_insert(value);
    }

    /// Values of a profile, created empty on first access
    pub fn get(&mut self, profile: &str) -> &mut PropertyValues {
        if profile.is_empty() {
            &mut self.prod
        } else {
            self.profiles.entry(profile.to_string()).or_default()
        }
    }

    /// Values of the default profile
    pub fn prod_values(&self) -> &PropertyValues {
        &self.prod
    }

    /// Non-default profiles, as accumulated
    pub fn profiles(&self) -> &BTreeMap<String, PropertyValues> {
        &self.profiles
    }

    /// Non-default profiles with the gaps filled from the default profile
    pub fn reconciled_profiles(&self) -> BTreeMap<String, PropertyValues> {
        self.profiles
            .iter()
            .map(|(profile, values)| {
                let mut values = values.clone();
                for (property, value) in &self.prod {
                    values
                        .entry(property.clone())
                        .or_insert_with(|| value.clone());
                }
                (profile.clone(), values)
            })
            .collect()
    }
}

/// Expand dotted properties into nested mappings
///
/// `{"image.tag": "latest", "replicas": 1}` becomes
/// `{image: {tag: latest}, replicas: 1}`.
pub fn nest_properties(flat: &PropertyValues) -> Value {
    let mut root = Value::Mapping(Mapping::new());

    for (property, value) in flat {
        let parts: Vec<&str> = property.split('.').collect();
        set_nested(&mut root, property, &parts, value.clone());
    }

    root
}

fn set_nested(node: &mut Value, property: &str, path: &[&str], new_value: Value) {
    let Some((key, remaining)) = path.split_first() else {
        *node = new_value;
        return;
    };

    if !node.is_mapping() {
        if !node.is_null() {
            tracing::warn!(
                "Value {:?} is dropped, `{}` needs a mapping at its place",
                node,
                property
            );
        }
        *node = Value::Mapping(Mapping::new());
    }

    if let Value::Mapping(map) = node {
        let key = Value::String((*key).to_string());
        if remaining.is_empty() {
            map.insert(key, new_value);
        } else {
            let entry = map
                .entry(key)
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            set_nested(entry, property, remaining, new_value);
        }
    }
}

/// Deep merge `overlay` into `base`
///
/// Rules:
/// - Mappings: recursive merge, keys missing from base are appended
/// - Anything else: decided by `precedence`
pub fn deep_merge(base: &mut Value, overlay: &Value, precedence: Precedence) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value, precedence),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            if precedence == Precedence::Overlay {
                *base = overlay.clone();
            }
        }
    }
}

/// Merge a generated document with a user-authored one
///
/// The user document wins on every key present in both, generated keys fill
/// the gaps. A user document that is not a mapping is ignored.
pub fn merge_user_overrides(generated: Value, user: Value) -> Value {
    match user {
        Value::Mapping(_) => {
            let mut result = user;
            deep_merge(&mut result, &generated, Precedence::Base);
            result
        }
        _ => generated,
    }
}

/// Merge `generated` with `<input_dir>/<file_name>` when that file exists
pub fn merge_with_file_if_exists(
    input_dir: Option<&Path>,
    file_name: &str,
    generated: Value,
) -> Result<Value> {
    let Some(user_file) = input_dir.map(|dir| dir.join(file_name)) else {
        return Ok(generated);
    };

    if !user_file.is_file() {
        return Ok(generated);
    }

    let content = std::fs::read_to_string(&user_file)?;
    let user: Value =
        serde_yaml::from_str(&content).map_err(|source| CoreError::InvalidYamlFile {
            path: user_file.clone(),
            source,
        })?;

    Ok(merge_user_overrides(generated, user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DependencyConfig;

    fn yaml(content: &str) -> Value {
        serde_yaml::from_str(content).unwrap()
    }

    #[test]
    fn test_put_if_absent_keeps_first() {
        let mut values = ValuesAccumulator::new();
        values.put_if_absent("app.replicas", Value::from(3), DEFAULT_PROFILE);
        values.put_if_absent("app.replicas", Value::from(5), DEFAULT_PROFILE);

        assert_eq!(values.prod_values()["app.replicas"], Value::from(3));

        values.put("app.replicas", Value::from(7), DEFAULT_PROFILE);
        assert_eq!(values.prod_values()["app.replicas"], Value::from(7));
    }

    #[test]
    fn test_get_creates_profile() {
        let mut values = ValuesAccumulator::new();
        assert!(values.get("dev").is_empty());
        assert!(values.profiles().contains_key("dev"));
        assert!(values.prod_values().is_empty());
    }

    #[test]
    fn test_populate_without_path_requires_value() {
        let config = ChartConfig::new("my-chart");
        let references = vec![ValueReference::new("app.name")];

        let err = ValuesAccumulator::populate(&config, &references).unwrap_err();
        assert!(matches!(
            err,
            CoreError::IncompleteValueMapping { ref property } if property == "app.name"
        ));
    }

    #[test]
    fn test_populate_literal_values_and_conditions() {
        let mut config = ChartConfig::new("my-chart");
        config.dependencies.push(
            DependencyConfig::new("postgresql", "12.x", "https://charts.example.com")
                .with_condition("db.enabled"),
        );

        let references = vec![
            ValueReference::new("app.name").with_value("demo"),
            ValueReference::new("app.name").with_value("ignored"),
            ValueReference::new("replicas").with_value(1).with_profile("dev"),
            ValueReference::new("image.tag").with_path("spec.image"),
        ];

        let values = ValuesAccumulator::populate(&config, &references).unwrap();

        assert_eq!(values.prod_values()["app.name"], Value::from("demo"));
        assert_eq!(values.prod_values()["db.enabled"], Value::Bool(true));
        assert!(!values.prod_values().contains_key("image.tag"));
        assert_eq!(values.profiles()["dev"]["replicas"], Value::from(1));
    }

    #[test]
    fn test_reconciled_profiles_fill_gaps() {
        let mut values = ValuesAccumulator::new();
        values.put("image.tag", Value::from("latest"), DEFAULT_PROFILE);
        values.put("replicas", Value::from(3), DEFAULT_PROFILE);
        values.put("replicas", Value::from(1), "dev");

        let profiles = values.reconciled_profiles();
        let dev = &profiles["dev"];

        assert_eq!(dev["replicas"], Value::from(1));
        assert_eq!(dev["image.tag"], Value::from("latest"));
        // The accumulator itself is left untouched
        assert!(!values.profiles()["dev"].contains_key("image.tag"));
    }

    #[test]
    fn test_nest_properties() {
        let mut flat = PropertyValues::new();
        flat.insert("image.tag".to_string(), Value::from("latest"));
        flat.insert("image.repository".to_string(), Value::from("nginx"));
        flat.insert("replicas".to_string(), Value::from(1));

        let nested = nest_properties(&flat);

        assert_eq!(
            nested,
            yaml("image:\n  repository: nginx\n  tag: latest\nreplicas: 1\n")
        );
    }

    #[test]
    fn test_nest_properties_scalar_replaced_by_mapping() {
        // Logged as a warning, the nested property wins
        let mut flat = PropertyValues::new();
        flat.insert("db".to_string(), Value::from("x"));
        flat.insert("db.enabled".to_string(), Value::Bool(true));

        assert_eq!(nest_properties(&flat), yaml("db:\n  enabled: true\n"));
    }

    #[test]
    fn test_deep_merge_precedence() {
        let overlay = yaml("image:\n  tag: '2.0'\n  pullPolicy: Always\nreplicas: 3\n");

        let mut base = yaml("image:\n  repository: nginx\n  tag: '1.0'\nreplicas: 1\n");
        deep_merge(&mut base, &overlay, Precedence::Overlay);
        assert_eq!(base["image"]["tag"], Value::from("2.0"));
        assert_eq!(base["image"]["pullPolicy"], Value::from("Always"));
        assert_eq!(base["image"]["repository"], Value::from("nginx"));
        assert_eq!(base["replicas"], Value::from(3));

        let mut base = yaml("image:\n  repository: nginx\n  tag: '1.0'\nreplicas: 1\n");
        deep_merge(&mut base, &overlay, Precedence::Base);
        assert_eq!(base["image"]["tag"], Value::from("1.0"));
        assert_eq!(base["image"]["pullPolicy"], Value::from("Always"));
        assert_eq!(base["replicas"], Value::from(1));
    }

    #[test]
    fn test_merge_user_overrides_user_wins() {
        let generated = yaml("name: generated\nversion: 1.0.0\ndescription: from config\n");
        let user = yaml("description: hand written\nhome: https://example.com\n");

        let merged = merge_user_overrides(generated, user);

        assert_eq!(merged["description"], Value::from("hand written"));
        assert_eq!(merged["home"], Value::from("https://example.com"));
        assert_eq!(merged["name"], Value::from("generated"));
        assert_eq!(merged["version"], Value::from("1.0.0"));
    }

    #[test]
    fn test_merge_user_overrides_ignores_empty_file() {
        let generated = yaml("name: generated\n");
        assert_eq!(merge_user_overrides(generated.clone(), Value::Null), generated);
    }

    #[test]
    fn test_merge_with_file_if_exists() {
        let temp = tempfile::TempDir::new().unwrap();
        let generated = yaml("app:\n  replicas: 3\n  name: demo\n");

        let untouched =
            merge_with_file_if_exists(Some(temp.path()), "values.yaml", generated.clone())
                .unwrap();
        assert_eq!(untouched, generated);

        std::fs::write(temp.path().join("values.yaml"), "app:\n  replicas: 5\n").unwrap();
        let merged =
            merge_with_file_if_exists(Some(temp.path()), "values.yaml", generated).unwrap();

        assert_eq!(merged["app"]["replicas"], Value::from(5));
        assert_eq!(merged["app"]["name"], Value::from("demo"));
    }
}
