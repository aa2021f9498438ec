//! Helm chart writer
//!
//! Turns rendered Kubernetes manifests into a Helm chart directory:
//!
//! ```text
//! <output>/<name>/
//! ├── Chart.yaml
//! ├── values.yaml
//! ├── values.<profile>.yaml
//! ├── charts/
//! ├── templates/
//! │   ├── <kind>.yaml
//! │   └── NOTES.txt
//! └── README.md, LICENSE, ... (copied from the input directory)
//! ```
//!
//! and optionally packages it as `<output>/<name>-<version>.<extension>`.

use chartgen_core::{
    ArchiveFormat, ChartConfig, ChartDescriptor, EmbeddedResources, ResourceProvider,
    ValueReference, ValuesAccumulator, create_archive, merge_with_file_if_exists, nest_properties,
};
use std::path::{Path, PathBuf};

use crate::artifacts::Artifacts;
use crate::deps::{DependencyResolver, HelmDependencyBuild};
use crate::document::{ResourceDocument, is_manifest_file, load_manifest};
use crate::error::{EngineError, Result};
use crate::rewriter::ValuesRewriter;
use crate::templates::{TEMPLATES, TemplateAssembler, process_user_templates};

pub const CHART_FILENAME: &str = "Chart.yaml";
pub const VALUES_FILENAME: &str = "values.yaml";
pub const CHARTS_DIR: &str = "charts";
pub const NOTES_FILENAME: &str = "NOTES.txt";

/// Files and directories copied from the input directory, matched ignoring case
pub const ADDITIONAL_CHART_FILES: &[&str] = &[
    "README.md",
    "LICENSE",
    "values.schema.json",
    "app-readme.md",
    "questions.yml",
    "questions.yaml",
    "requirements.yml",
    "requirements.yaml",
    "crds",
];

/// Inputs of one chart build
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Rendered manifest files; names not ending in `.yml`/`.yaml` are skipped
    pub manifests: Vec<PathBuf>,
    /// Directory holding user-provided chart files
    pub input_dir: Option<PathBuf>,
    /// The chart is written to `<output_dir>/<name>`
    pub output_dir: PathBuf,
    /// Chart version used when the configuration sets none
    pub default_version: String,
}

impl BuildContext {
    pub fn new(output_dir: impl Into<PathBuf>, default_version: impl Into<String>) -> Self {
        Self {
            manifests: Vec::new(),
            input_dir: None,
            output_dir: output_dir.into(),
            default_version: default_version.into(),
        }
    }

    pub fn with_manifest(mut self, manifest: impl Into<PathBuf>) -> Self {
        self.manifests.push(manifest.into());
        self
    }

    pub fn with_input_dir(mut self, input_dir: impl Into<PathBuf>) -> Self {
        self.input_dir = Some(input_dir.into());
        self
    }

    fn input_dir(&self) -> Option<&Path> {
        self.input_dir.as_deref().filter(|dir| dir.is_dir())
    }
}

/// Writes Helm charts for one configuration
pub struct ChartWriter<'a> {
    config: &'a ChartConfig,
    resources: Box<dyn ResourceProvider + 'a>,
    dependency_resolver: Box<dyn DependencyResolver + 'a>,
}

impl<'a> ChartWriter<'a> {
    pub fn new(config: &'a ChartConfig) -> Self {
        Self {
            config,
            resources: Box::new(EmbeddedResources::new()),
            dependency_resolver: Box::new(HelmDependencyBuild::new()),
        }
    }

    /// Resolve notes templates with another provider
    pub fn with_resources(mut self, resources: impl ResourceProvider + 'a) -> Self {
        self.resources = Box::new(resources);
        self
    }

    /// Fetch chart dependencies with another resolver
    pub fn with_dependency_resolver(mut self, resolver: impl DependencyResolver + 'a) -> Self {
        self.dependency_resolver = Box::new(resolver);
        self
    }

    /// Write the chart and return every produced path
    ///
    /// A disabled configuration writes nothing and returns no artifact.
    pub fn write(&self, context: &BuildContext, references: &[ValueReference]) -> Result<Artifacts> {
        let mut artifacts = Artifacts::new();
        if !self.config.enabled {
            tracing::debug!("Chart generation is disabled");
            return Ok(artifacts);
        }

        self.config.validate()?;

        let output_dir =
            std::path::absolute(&context.output_dir).map_err(|e| EngineError::write(&context.output_dir, e))?;
        let chart_dir = output_dir.join(&self.config.name);
        let input_dir = context.input_dir();

        tracing::info!("Creating Helm Chart \"{}\"", self.config.name);

        let mut values = ValuesAccumulator::populate(self.config, references)?;

        self.write_templates(context, references, &chart_dir, &mut values, &mut artifacts)?;
        self.write_chart_yaml(input_dir, &chart_dir, &context.default_version, &mut artifacts)?;
        self.write_values(input_dir, &chart_dir, &values, &mut artifacts)?;
        create_dir(&chart_dir.join(CHARTS_DIR), &mut artifacts)?;
        self.write_notes(input_dir, &chart_dir, &mut artifacts)?;
        copy_additional_files(input_dir, &chart_dir, &mut artifacts)?;

        if !self.config.dependencies.is_empty() {
            self.dependency_resolver.build(&chart_dir)?;
        }

        if self.config.create_tar_file {
            self.package(&output_dir, &chart_dir, &context.default_version, &mut artifacts)?;
        }

        Ok(artifacts)
    }

    fn write_templates(
        &self,
        context: &BuildContext,
        references: &[ValueReference],
        chart_dir: &Path,
        values: &mut ValuesAccumulator,
        artifacts: &mut Artifacts,
    ) -> Result<()> {
        let templates_dir = chart_dir.join(TEMPLATES);
        std::fs::create_dir_all(&templates_dir).map_err(|e| EngineError::write(&templates_dir, e))?;

        let documents = self.rewrite_manifests(context, references, values)?;

        let functions = process_user_templates(context.input_dir(), &templates_dir, artifacts)?;
        let mut assembler = TemplateAssembler::new(self.config, functions)?;
        for document in documents {
            assembler.add(document)?;
        }

        for (file_name, content) in assembler.into_files() {
            let path = templates_dir.join(file_name);
            write_file(&path, &content)?;
            artifacts.insert_text(path, content);
        }
        Ok(())
    }

    fn rewrite_manifests(
        &self,
        context: &BuildContext,
        references: &[ValueReference],
        values: &mut ValuesAccumulator,
    ) -> Result<Vec<ResourceDocument>> {
        let rewriter = ValuesRewriter::new(self.config, references)?;
        let mut documents = Vec::new();

        for manifest in context.manifests.iter().filter(|m| is_manifest_file(m)) {
            tracing::debug!("Processing manifest {}", manifest.display());
            let mut resources = load_manifest(manifest)?;
            rewriter.rewrite(&mut resources, values);
            documents.extend(resources);
        }

        Ok(documents)
    }

    fn write_chart_yaml(
        &self,
        input_dir: Option<&Path>,
        chart_dir: &Path,
        default_version: &str,
        artifacts: &mut Artifacts,
    ) -> Result<()> {
        let descriptor = ChartDescriptor::from_config(self.config, default_version);
        if semver::Version::parse(&descriptor.version).is_err() {
            tracing::warn!(
                "Chart version '{}' is not a valid SemVer 2 version, helm may reject it",
                descriptor.version
            );
        }

        let chart = merge_with_file_if_exists(input_dir, CHART_FILENAME, descriptor.to_value()?)?;
        let path = chart_dir.join(CHART_FILENAME);
        let content = serde_yaml::to_string(&chart)?;
        write_file(&path, &content)?;
        artifacts.insert_text(path, content);
        Ok(())
    }

    fn write_values(
        &self,
        input_dir: Option<&Path>,
        chart_dir: &Path,
        values: &ValuesAccumulator,
        artifacts: &mut Artifacts,
    ) -> Result<()> {
        for (profile, profile_values) in values.reconciled_profiles() {
            let path = chart_dir.join(format!("values.{}.yaml", profile));
            let content = values_yaml(input_dir, &profile_values)?;
            write_file(&path, &content)?;
            artifacts.insert_text(path, content);
        }

        let path = chart_dir.join(VALUES_FILENAME);
        let content = values_yaml(input_dir, values.prod_values())?;
        write_file(&path, &content)?;
        artifacts.insert_text(path, content);
        Ok(())
    }

    fn write_notes(
        &self,
        input_dir: Option<&Path>,
        chart_dir: &Path,
        artifacts: &mut Artifacts,
    ) -> Result<()> {
        let user_notes = input_dir
            .map(|dir| dir.join(NOTES_FILENAME))
            .filter(|path| path.is_file());

        let content = match user_notes {
            Some(path) => std::fs::read(&path).map_err(|e| EngineError::read(&path, e))?,
            None => {
                let Some(name) = self.config.notes.as_deref().filter(|n| !n.is_empty()) else {
                    return Ok(());
                };
                self.resources
                    .load(name)?
                    .ok_or_else(|| EngineError::NotesNotFound {
                        name: name.to_string(),
                    })?
            }
        };

        let path = chart_dir.join(TEMPLATES).join(NOTES_FILENAME);
        std::fs::write(&path, content).map_err(|e| EngineError::write(&path, e))?;
        artifacts.insert_marker(path);
        Ok(())
    }

    fn package(
        &self,
        output_dir: &Path,
        chart_dir: &Path,
        default_version: &str,
        artifacts: &mut Artifacts,
    ) -> Result<()> {
        let mut files = Vec::new();
        for path in artifacts.paths() {
            if path.is_dir() {
                files.extend(list_files(path)?);
            } else if path.is_file() {
                files.push(path.clone());
            }
        }

        let archive_path = output_dir.join(self.config.archive_file_name(default_version));
        create_archive(
            &archive_path,
            chart_dir,
            &files,
            &self.config.name,
            ArchiveFormat::from_extension(&self.config.extension),
        )?;

        tracing::info!("Packaged chart into {}", archive_path.display());
        artifacts.insert_binary(archive_path);
        Ok(())
    }
}

fn values_yaml(input_dir: Option<&Path>, values: &chartgen_core::PropertyValues) -> Result<String> {
    let merged = merge_with_file_if_exists(input_dir, VALUES_FILENAME, nest_properties(values))?;
    Ok(serde_yaml::to_string(&merged)?)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| EngineError::write(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| EngineError::write(path, e))?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

fn create_dir(path: &Path, artifacts: &mut Artifacts) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| EngineError::write(path, e))?;
    artifacts.insert_marker(path);
    Ok(())
}

/// Regular files directly inside a directory, sorted by name
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = std::fs::read_dir(dir)
        .map_err(|e| EngineError::read(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| EngineError::read(dir, e))?;
    files.retain(|path| path.is_file());
    files.sort();
    Ok(files)
}

fn copy_additional_files(
    input_dir: Option<&Path>,
    chart_dir: &Path,
    artifacts: &mut Artifacts,
) -> Result<()> {
    let Some(input_dir) = input_dir else {
        return Ok(());
    };

    let mut entries = std::fs::read_dir(input_dir)
        .map_err(|e| EngineError::read(input_dir, e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| EngineError::read(input_dir, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        if !ADDITIONAL_CHART_FILES
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(&name))
        {
            continue;
        }

        let source = entry.path();
        let target = chart_dir.join(&file_name);

        if source.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| EngineError::write(&target, e))?;
            for file in list_files(&source)? {
                if let Some(file_name) = file.file_name() {
                    let destination = target.join(file_name);
                    std::fs::copy(&file, &destination)
                        .map_err(|e| EngineError::write(&destination, e))?;
                }
            }
        } else {
            std::fs::copy(&source, &target).map_err(|e| EngineError::write(&target, e))?;
        }

        tracing::debug!("Copied {}", name);
        artifacts.insert_marker(target);
    }

    Ok(())
}
