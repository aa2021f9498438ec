//! chartgen Core - Core types for the Helm chart materialization engine
//!
//! This crate provides the foundational types used throughout chartgen:
//! - `ChartConfig`: The build configuration and value references
//! - `ValuesAccumulator`: Per-profile values with deep merge support
//! - `ChartDescriptor`: The generated Chart.yaml
//! - `archive`: Chart packaging
//! - `ResourceProvider`: Named resources such as notes templates

pub mod archive;
pub mod chart;
pub mod config;
pub mod error;
pub mod resources;
pub mod values;

pub use archive::{ArchiveEntry, ArchiveFormat, create_archive, list_archive};
pub use chart::{ChartDependency, ChartDescriptor, Maintainer};
pub use config::{
    AddIfStatement, ChartConfig, DependencyConfig, HelmExpression, ValueReference,
    DEFAULT_NOTES, ENVIRONMENT_PROPERTY_GROUP,
};
pub use error::{CoreError, Result};
pub use resources::{EmbeddedResources, ResourceProvider};
pub use values::{
    DEFAULT_PROFILE, Precedence, PropertyValues, ValuesAccumulator, deep_merge,
    merge_user_overrides, merge_with_file_if_exists, nest_properties,
};
