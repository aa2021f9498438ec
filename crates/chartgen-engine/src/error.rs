//! Engine error types

use chartgen_core::CoreError;
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(code(chartgen::config))]
    Core(#[from] CoreError),

    #[error("Invalid YAML path '{path}': {message}")]
    #[diagnostic(
        code(chartgen::path),
        help("Paths look like `spec.replicas`, `spec.containers[0].image` or `(kind == Deployment).spec.replicas`")
    )]
    InvalidPath { path: String, message: String },

    #[error("Failed to parse manifest {path}: {source}")]
    #[diagnostic(code(chartgen::manifest))]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to read {path}: {source}")]
    #[diagnostic(code(chartgen::io::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    #[diagnostic(code(chartgen::io::write))]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not find the notes template file at {name}")]
    #[diagnostic(
        code(chartgen::notes),
        help("Add a NOTES.txt file to the input directory, or point `notes` at an existing resource")
    )]
    NotesNotFound { name: String },

    #[error("Error fetching Helm dependencies. Cause: {output}")]
    #[diagnostic(code(chartgen::dependencies))]
    DependencyBuild { output: String },

    #[error("Failed to run `{command}`: {source}")]
    #[diagnostic(
        code(chartgen::dependencies::spawn),
        help("Make sure the helm binary is installed and on the PATH")
    )]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    #[diagnostic(code(chartgen::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl EngineError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
