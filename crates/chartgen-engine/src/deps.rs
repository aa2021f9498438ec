//! Chart dependency fetching

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{EngineError, Result};

/// Fetches the declared dependencies of a written chart into its `charts/` directory
pub trait DependencyResolver {
    fn build(&self, chart_dir: &Path) -> Result<()>;
}

/// Runs `helm dependency build` in the chart directory
#[derive(Debug, Clone)]
pub struct HelmDependencyBuild {
    binary: PathBuf,
}

impl HelmDependencyBuild {
    pub fn new() -> Self {
        Self::with_binary("helm")
    }

    /// Use another helm executable
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command_line(&self) -> String {
        format!("{} dependency build", self.binary.display())
    }
}

impl Default for HelmDependencyBuild {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyResolver for HelmDependencyBuild {
    fn build(&self, chart_dir: &Path) -> Result<()> {
        tracing::info!("Running `{}` in {}", self.command_line(), chart_dir.display());

        let output = Command::new(&self.binary)
            .args(["dependency", "build"])
            .current_dir(chart_dir)
            .output()
            .map_err(|source| EngineError::CommandSpawn {
                command: self.command_line(),
                source,
            })?;

        if output.status.success() {
            tracing::info!("Dependencies successfully fetched");
            return Ok(());
        }

        let mut captured = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !captured.is_empty() {
                captured.push('\n');
            }
            captured.push_str(stderr.trim());
        }

        Err(EngineError::DependencyBuild { output: captured })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_binary() {
        let temp = TempDir::new().unwrap();
        let resolver = HelmDependencyBuild::with_binary(temp.path().join("no-such-helm"));

        let err = resolver.build(temp.path()).unwrap_err();
        assert!(matches!(err, EngineError::CommandSpawn { .. }));
    }

    #[cfg(unix)]
    fn fake_helm(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("helm");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_captures_output() {
        let temp = TempDir::new().unwrap();
        let helm = fake_helm(temp.path(), "echo \"Error: no repository definition\" >&2\nexit 1");

        let err = HelmDependencyBuild::with_binary(helm)
            .build(temp.path())
            .unwrap_err();

        match err {
            EngineError::DependencyBuild { output } => {
                assert_eq!(output, "Error: no repository definition");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_in_chart_directory() {
        let temp = TempDir::new().unwrap();
        let chart_dir = temp.path().join("chart");
        std::fs::create_dir_all(&chart_dir).unwrap();
        let helm = fake_helm(temp.path(), "echo \"$1 $2\" > invoked.txt");

        HelmDependencyBuild::with_binary(helm).build(&chart_dir).unwrap();

        assert_eq!(
            std::fs::read_to_string(chart_dir.join("invoked.txt")).unwrap(),
            "dependency build\n"
        );
    }
}
