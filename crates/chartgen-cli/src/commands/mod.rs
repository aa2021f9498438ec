//! CLI commands

pub mod generate;
