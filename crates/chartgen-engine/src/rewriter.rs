//! Value reference rewriting
//!
//! Every path of a value reference is replaced by a Helm expression in the
//! resources of a manifest, and the value found there (or the declared one)
//! is recorded in the values accumulator.
//!
//! Environment properties (`<prefix>.envs.<NAME>`) are processed after all
//! the others. When a property ending with the same name already exists in
//! the target profile it is reused, so the same variable declared by
//! several references shares one values entry.

use chartgen_core::{ChartConfig, DEFAULT_PROFILE, ValueReference, ValuesAccumulator};
use serde_yaml::Value;
use std::collections::HashMap;

use crate::document::{ResourceDocument, expression, values_expression};
use crate::error::Result;
use crate::path::YamlPath;

/// Value already resolved for a property while rewriting one manifest
struct SeenValue {
    /// Default profile value: the declared one for a default reference, the
    /// manifest one when a profiled reference came first
    value: Value,
    /// The default profile entry was filled in by a profiled reference
    seeded: bool,
}

type SeenValues = HashMap<String, SeenValue>;

struct PreparedReference<'a> {
    reference: &'a ValueReference,
    paths: Vec<YamlPath>,
}

/// Rewrites manifests according to a list of value references
pub struct ValuesRewriter<'a> {
    config: &'a ChartConfig,
    references: Vec<PreparedReference<'a>>,
}

impl<'a> ValuesRewriter<'a> {
    /// Prepare the references, failing on the first invalid path
    pub fn new(config: &'a ChartConfig, references: &'a [ValueReference]) -> Result<Self> {
        let references = references
            .iter()
            .filter(|r| r.has_paths())
            .map(|reference| {
                let paths = reference
                    .paths
                    .iter()
                    .map(|p| YamlPath::parse(p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(PreparedReference { reference, paths })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { config, references })
    }

    /// Rewrite the resources of one manifest file
    pub fn rewrite(&self, resources: &mut [ResourceDocument], values: &mut ValuesAccumulator) {
        let mut seen = SeenValues::new();

        for prepared in self
            .references
            .iter()
            .filter(|p| !p.reference.is_environment_property())
        {
            let property = self.config.deduce_property(&prepared.reference.property);
            let value = prepared.reference.value.clone();
            self.process_value_reference(&property, value, prepared, resources, values, &mut seen);
        }

        for prepared in self
            .references
            .iter()
            .filter(|p| p.reference.is_environment_property())
        {
            let reference = prepared.reference;
            let name = reference.environment_property_name();

            let existing = values
                .get(reference.profile())
                .iter()
                .find(|(property, _)| property.ends_with(name))
                .map(|(property, value)| (property.clone(), value.clone()));

            let (property, value) = match existing {
                Some((property, value)) => (property, Some(value)),
                None => (
                    self.config.deduce_property(&reference.property),
                    reference.value.clone(),
                ),
            };

            self.process_value_reference(&property, value, prepared, resources, values, &mut seen);
        }
    }

    fn process_value_reference(
        &self,
        property: &str,
        value: Option<Value>,
        prepared: &PreparedReference<'_>,
        resources: &mut [ResourceDocument],
        values: &mut ValuesAccumulator,
        seen: &mut SeenValues,
    ) {
        let reference = prepared.reference;
        let profile = reference.profile();
        let node = expression(
            reference
                .expression
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| values_expression(property)),
        );

        let applicable: Vec<bool> = resources
            .iter()
            .map(|r| reference.applies_to(r.kind(), r.name()))
            .collect();

        if let Some(seen_value) = seen.get_mut(property) {
            let resolved = value.unwrap_or_else(|| seen_value.value.clone());
            if profile.is_empty() && seen_value.seeded {
                values.put(property, resolved, profile);
                seen_value.seeded = false;
            } else {
                values.put_if_absent(property, resolved, profile);
            }
            for path in &prepared.paths {
                for (resource, _) in resources.iter_mut().zip(&applicable).filter(|(_, a)| **a) {
                    path.set(&mut resource.root, &node);
                }
            }
            return;
        }

        for path in &prepared.paths {
            let mut found = None;
            for (resource, _) in resources.iter_mut().zip(&applicable).filter(|(_, a)| **a) {
                let previous = path.read_and_set(&mut resource.root, &node);
                if found.is_none() {
                    found = previous;
                }
            }

            let Some(actual) = value.clone().or_else(|| found.clone()) else {
                continue;
            };
            tracing::debug!("Mapped {} to {}", path, property);
            values.put_if_absent(property, actual.clone(), profile);

            if !seen.contains_key(property) {
                let (default_value, seeded) = if profile.is_empty() {
                    (actual, false)
                } else {
                    let manifest_value = found.unwrap_or(actual);
                    let seeded = !values.prod_values().contains_key(property);
                    values.put_if_absent(property, manifest_value.clone(), DEFAULT_PROFILE);
                    (manifest_value, seeded)
                };
                seen.insert(
                    property.to_string(),
                    SeenValue {
                        value: default_value,
                        seeded,
                    },
                );
            }
        }
    }
}
