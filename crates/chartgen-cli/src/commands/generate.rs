//! Generate command - write a Helm chart from rendered manifests

use chartgen_core::ChartConfig;
use chartgen_engine::{Artifacts, BuildContext, ChartWriter, DependencyResolver, is_manifest_file};
use console::style;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct GenerateArgs {
    pub config: PathBuf,
    pub manifests: Vec<PathBuf>,
    pub input_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub default_version: String,
    pub package: bool,
    pub skip_dependency_build: bool,
    pub json: bool,
}

/// Leaves `charts/` as written
struct SkipDependencyBuild;

impl DependencyResolver for SkipDependencyBuild {
    fn build(&self, chart_dir: &Path) -> chartgen_engine::Result<()> {
        tracing::info!("Skipping dependency build for {}", chart_dir.display());
        Ok(())
    }
}

pub fn run(args: &GenerateArgs) -> Result<()> {
    let mut config = ChartConfig::from_file(&args.config)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to load chart configuration from {}", args.config.display()))?;

    if args.package {
        config.create_tar_file = true;
    }

    if !config.enabled {
        if !args.json {
            println!(
                "{} chart generation is disabled in {}",
                style("Skipped").yellow().bold(),
                args.config.display()
            );
        } else {
            print_json(&config, &Artifacts::new())?;
        }
        return Ok(());
    }

    let manifests = collect_manifests(&args.manifests)?;
    if manifests.is_empty() {
        tracing::warn!("No manifest found, the chart will only hold the generated files");
    }

    let mut context = BuildContext::new(&args.output_dir, &args.default_version);
    context.manifests = manifests;
    context.input_dir = args.input_dir.clone();

    if !args.json {
        println!(
            "{} {} v{}",
            style("Generating").cyan().bold(),
            config.name,
            config.resolve_version(&args.default_version)
        );
    }

    let references = config.value_references(Vec::new());
    let mut writer = ChartWriter::new(&config);
    if args.skip_dependency_build {
        writer = writer.with_dependency_resolver(SkipDependencyBuild);
    }

    let artifacts = writer.write(&context, &references)?;

    if args.json {
        print_json(&config, &artifacts)
    } else {
        print_artifacts(&artifacts);
        Ok(())
    }
}

/// Expand directories into the manifest files they contain, sorted by path
fn collect_manifests(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut manifests = Vec::new();

    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry
                    .into_diagnostic()
                    .wrap_err_with(|| format!("Failed to read {}", input.display()))?;
                if entry.file_type().is_file() && is_manifest_file(entry.path()) {
                    manifests.push(entry.into_path());
                }
            }
        } else if input.is_file() {
            manifests.push(input.clone());
        } else {
            return Err(miette::miette!(
                help = "Pass a manifest file or a directory containing manifests",
                "Manifest path not found: {}",
                input.display()
            ));
        }
    }

    Ok(manifests)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArtifactKind {
    File,
    Directory,
    Archive,
}

impl ArtifactKind {
    fn of(path: &Path, content: &Option<String>) -> Self {
        match content {
            None => Self::Archive,
            Some(_) if path.is_dir() => Self::Directory,
            Some(_) => Self::File,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Archive => "archive",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn print_artifacts(artifacts: &Artifacts) {
    for (path, content) in artifacts.iter() {
        let label = match ArtifactKind::of(path, content) {
            ArtifactKind::Archive => style("Packaged").green().bold(),
            ArtifactKind::Directory => style("Created").dim(),
            ArtifactKind::File => style("Wrote").green(),
        };
        println!("  {} {}", label, path.display());
    }

    println!();
    println!(
        "{} {} artifact(s)",
        style("Done").green().bold(),
        artifacts.len()
    );
}

fn print_json(config: &ChartConfig, artifacts: &Artifacts) -> Result<()> {
    let entries: Vec<serde_json::Value> = artifacts
        .iter()
        .map(|(path, content)| {
            serde_json::json!({
                "path": path.display().to_string(),
                "kind": ArtifactKind::of(path, content).as_str(),
            })
        })
        .collect();

    let output = serde_json::json!({
        "chart": config.name,
        "enabled": config.enabled,
        "artifacts": entries,
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&output).into_diagnostic()?
    );
    Ok(())
}
