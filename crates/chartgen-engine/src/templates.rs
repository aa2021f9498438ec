//! Helm template assembly
//!
//! Rewritten resources are grouped by kind into `templates/<kind>.yaml`.
//! User templates found under `<input>/templates` contribute helper files
//! (names starting with `_`, copied as they are) and `define` blocks which
//! are prepended to the generated file of the same name.

use chartgen_core::{AddIfStatement, ChartConfig};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

use crate::artifacts::Artifacts;
use crate::document::{ResourceDocument, expression, to_template_yaml};
use crate::error::{EngineError, Result};
use crate::path::YamlPath;

pub const TEMPLATES: &str = "templates";

const FUNCTION_START: &str = "{{- define";
const FUNCTION_END: &str = "{{- end }}";
const HELPER_PREFIX: char = '_';

/// Markers that keep text intact through YAML serialization
///
/// A string value `:START:{{ x }}:END:` is written as `{{ x }}` once the
/// quotes the serializer adds are removed. `:DOUBLE_QUOTES:` becomes `"` and
/// `:LINE_SEPARATOR:` a newline.
pub const START_TOKEN: &str = ":START:";
pub const END_TOKEN: &str = ":END:";
pub const DOUBLE_QUOTES_TOKEN: &str = ":DOUBLE_QUOTES:";
pub const LINE_SEPARATOR_TOKEN: &str = ":LINE_SEPARATOR:";

static ESCAPED_LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\\n\s*\\").expect("valid regex"));

/// Undo the quoting applied by YAML serialization around template expressions
pub fn repair_template_text(text: &str) -> String {
    let repaired = text
        .replace("\"{{", "{{")
        .replace("}}\"", "}}")
        .replace("'{{", "{{")
        .replace("}}'", "}}")
        .replace(&format!("\"{}", START_TOKEN), "")
        .replace(&format!("'{}", START_TOKEN), "")
        .replace(&format!("{}\"", END_TOKEN), "")
        .replace(&format!("{}'", END_TOKEN), "")
        .replace(DOUBLE_QUOTES_TOKEN, "\"")
        .replace(LINE_SEPARATOR_TOKEN, "\n");

    ESCAPED_LINE_BREAK.replace_all(&repaired, "").into_owned()
}

/// Wrap content in `{{- if .Values.<property> }}` ... `{{- end }}`
pub fn wrap_if_statement(content: &str, property: &str) -> String {
    format!(
        "{{{{- if .Values.{} }}}}\n{}\n{}\n",
        property,
        content.trim_end_matches('\n'),
        FUNCTION_END
    )
}

/// Lines of every `{{- define` ... `{{- end }}` block
pub fn extract_template_functions(content: &str) -> String {
    let mut functions = String::new();
    let mut in_function = false;

    for line in content.lines() {
        if in_function || line.contains(FUNCTION_START) {
            in_function = !line.contains(FUNCTION_END);
            functions.push_str(line);
            functions.push('\n');
        }
    }

    functions
}

/// Copy helper templates and index the functions of the other user templates
///
/// Returns the extracted functions keyed by template file name.
pub fn process_user_templates(
    input_dir: Option<&Path>,
    templates_dir: &Path,
    artifacts: &mut Artifacts,
) -> Result<HashMap<String, String>> {
    let mut functions = HashMap::new();

    let Some(user_templates) = input_dir
        .map(|dir| dir.join(TEMPLATES))
        .filter(|dir| dir.is_dir())
    else {
        return Ok(functions);
    };

    let mut entries = std::fs::read_dir(&user_templates)
        .map_err(|e| EngineError::read(&user_templates, e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| EngineError::read(&user_templates, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let source = entry.path();
        if !source.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();

        if file_name.starts_with(HELPER_PREFIX) {
            let target = templates_dir.join(&file_name);
            std::fs::copy(&source, &target).map_err(|e| EngineError::write(&target, e))?;
            tracing::debug!("Copied helper template {}", file_name);
            artifacts.insert_marker(target);
        } else {
            let content =
                std::fs::read_to_string(&source).map_err(|e| EngineError::read(&source, e))?;
            functions.insert(file_name, extract_template_functions(&content));
        }
    }

    Ok(functions)
}

/// Accumulates the generated template files, in order of first appearance
pub struct TemplateAssembler<'a> {
    config: &'a ChartConfig,
    functions: HashMap<String, String>,
    expressions: Vec<(YamlPath, String)>,
    files: IndexMap<String, String>,
}

impl<'a> TemplateAssembler<'a> {
    pub fn new(config: &'a ChartConfig, functions: HashMap<String, String>) -> Result<Self> {
        let expressions = config
            .expressions
            .iter()
            .map(|e| Ok((YamlPath::parse(&e.path)?, e.expression.clone())))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            functions,
            expressions,
            files: IndexMap::new(),
        })
    }

    /// Add one rewritten resource to the file of its kind
    pub fn add(&mut self, mut document: ResourceDocument) -> Result<()> {
        for (path, text) in &self.expressions {
            path.read_and_set(&mut document.root, &expression(text.as_str()));
        }

        let Some(file_name) = document.template_file_name() else {
            tracing::warn!("Skipping resource without a kind");
            return Ok(());
        };

        let mut adapted = format!("---\n{}", to_template_yaml(&document.root)?);

        if !self.files.contains_key(&file_name)
            && let Some(functions) = self.functions.get(&file_name).filter(|f| !f.is_empty())
        {
            adapted = format!("{}\n{}", functions, adapted);
        }

        for statement in self.matching_statements(&document) {
            adapted = wrap_if_statement(&adapted, &self.config.deduce_property(&statement.property));
        }

        self.files
            .entry(file_name)
            .or_default()
            .push_str(&repair_template_text(&adapted));
        Ok(())
    }

    fn matching_statements(&self, document: &ResourceDocument) -> Vec<&'a AddIfStatement> {
        let config: &'a ChartConfig = self.config;
        config
            .add_if_statements
            .iter()
            .filter(|s| s.matches(document.kind(), document.name()))
            .collect()
    }

    /// Generated files with their complete content
    pub fn into_files(self) -> IndexMap<String, String> {
        self.files
    }
}
