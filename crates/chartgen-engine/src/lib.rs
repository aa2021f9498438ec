//! chartgen Engine - Kubernetes manifests to Helm charts
//!
//! This crate turns rendered manifests into a Helm chart:
//! - Value references rewrite manifest nodes into `{{ .Values.* }}` expressions
//! - Resources are grouped by kind into template files
//! - Chart.yaml, values files, notes and user files are written next to them
//! - The chart can be packaged into a tarball

pub mod artifacts;
pub mod deps;
pub mod document;
pub mod error;
pub mod path;
pub mod rewriter;
pub mod templates;
pub mod writer;

pub use artifacts::Artifacts;
pub use deps::{DependencyResolver, HelmDependencyBuild};
pub use document::{ResourceDocument, expression, is_expression, is_manifest_file};
pub use error::{EngineError, Result};
pub use path::YamlPath;
pub use rewriter::ValuesRewriter;
pub use templates::{TemplateAssembler, repair_template_text};
pub use writer::{BuildContext, ChartWriter};
