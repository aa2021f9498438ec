//! Manifest documents and template serialization
//!
//! Manifests are parsed into generic YAML trees. Rewritten nodes hold a Helm
//! expression such as `{{ .Values.app.image }}`; those are stored as values
//! tagged with [`EXPRESSION_TAG`] so the emitter can write them verbatim,
//! where a plain YAML serializer would quote them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

/// Tag marking a raw Helm expression
pub const EXPRESSION_TAG: &str = "chartgen/expression";

static MANIFEST_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^.*\.ya?ml$").expect("valid regex"));

/// One Kubernetes resource of a manifest file
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDocument {
    pub root: Value,
}

impl ResourceDocument {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn kind(&self) -> Option<&str> {
        self.root.get("kind").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.root
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
    }

    /// Template file holding resources of this kind, `deployment.yaml` for a Deployment
    pub fn template_file_name(&self) -> Option<String> {
        self.kind().map(|kind| format!("{}.yaml", kind.to_lowercase()))
    }
}

/// Whether a path names a YAML manifest (`.yml` or `.yaml`, any case)
pub fn is_manifest_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| MANIFEST_FILE.is_match(&name.to_string_lossy()))
        .unwrap_or(false)
}

/// Parse every non-empty document of a multi-document YAML stream
pub fn parse_documents(content: &str) -> std::result::Result<Vec<ResourceDocument>, serde_yaml::Error> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let root = Value::deserialize(document)?;
        if !root.is_null() {
            documents.push(ResourceDocument::new(root));
        }
    }
    Ok(documents)
}

/// Read and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Vec<ResourceDocument>> {
    let content = std::fs::read_to_string(path).map_err(|e| EngineError::read(path, e))?;
    parse_documents(&content).map_err(|source| EngineError::Manifest {
        path: PathBuf::from(path),
        source,
    })
}

/// Node holding a raw Helm expression
pub fn expression(text: impl Into<String>) -> Value {
    Value::Tagged(Box::new(TaggedValue {
        tag: Tag::new(EXPRESSION_TAG),
        value: Value::String(text.into()),
    }))
}

pub fn is_expression(value: &Value) -> bool {
    matches!(value, Value::Tagged(tagged) if tagged.tag == Tag::new(EXPRESSION_TAG))
}

/// `{{ .Values.<property> }}`
pub fn values_expression(property: &str) -> String {
    format!("{{{{ .Values.{} }}}}", property)
}

/// Serialize a document as block-style YAML, writing expressions unquoted
pub fn to_template_yaml(value: &Value) -> Result<String> {
    let mut out = String::new();
    match value {
        Value::Mapping(map) if !map.is_empty() => emit_mapping(map, 0, &mut out)?,
        Value::Sequence(seq) if !seq.is_empty() => emit_sequence(seq, 0, &mut out)?,
        other => {
            out.push_str(&scalar(other, 0)?);
            out.push('\n');
        }
    }
    Ok(out)
}

fn emit_mapping(map: &Mapping, indent: usize, out: &mut String) -> Result<()> {
    for (key, value) in map {
        out.push_str(&" ".repeat(indent));
        out.push_str(&scalar(key, indent)?);
        out.push(':');
        emit_entry_value(value, indent, out)?;
    }
    Ok(())
}

fn emit_entry_value(value: &Value, indent: usize, out: &mut String) -> Result<()> {
    match value {
        Value::Mapping(map) if !map.is_empty() => {
            out.push('\n');
            emit_mapping(map, indent + 2, out)
        }
        Value::Sequence(seq) if !seq.is_empty() => {
            out.push('\n');
            emit_sequence(seq, indent, out)
        }
        Value::Tagged(tagged) if !is_expression(value) && is_block(&tagged.value) => {
            out.push_str(&format!(" {}", tagged.tag));
            emit_entry_value(&tagged.value, indent, out)
        }
        other => {
            out.push(' ');
            out.push_str(&scalar(other, indent)?);
            out.push('\n');
            Ok(())
        }
    }
}

fn emit_sequence(seq: &[Value], indent: usize, out: &mut String) -> Result<()> {
    for item in seq {
        out.push_str(&" ".repeat(indent));
        out.push('-');
        match item {
            Value::Mapping(map) if !map.is_empty() => {
                let mut nested = String::new();
                emit_mapping(map, indent + 2, &mut nested)?;
                out.push(' ');
                out.push_str(&nested[indent + 2..]);
            }
            Value::Sequence(inner) if !inner.is_empty() => {
                let mut nested = String::new();
                emit_sequence(inner, indent + 2, &mut nested)?;
                out.push(' ');
                out.push_str(&nested[indent + 2..]);
            }
            other => {
                out.push(' ');
                out.push_str(&scalar(other, indent)?);
                out.push('\n');
            }
        }
    }
    Ok(())
}

fn is_block(value: &Value) -> bool {
    match value {
        Value::Mapping(map) => !map.is_empty(),
        Value::Sequence(seq) => !seq.is_empty(),
        _ => false,
    }
}

/// Single scalar, continuation lines indented under `indent`
fn scalar(value: &Value, indent: usize) -> Result<String> {
    let text = match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Mapping(map) if map.is_empty() => "{}".to_string(),
        Value::Sequence(seq) if seq.is_empty() => "[]".to_string(),
        Value::Tagged(tagged) if is_expression(value) => match &tagged.value {
            Value::String(s) => s.clone(),
            other => scalar(other, indent)?,
        },
        Value::Tagged(tagged) => format!("{} {}", tagged.tag, scalar(&tagged.value, indent)?),
        other => {
            let rendered = serde_yaml::to_string(other)?;
            rendered.trim_end_matches('\n').to_string()
        }
    };

    if !text.contains('\n') {
        return Ok(text);
    }

    let padding = " ".repeat(indent);
    let mut lines = text.lines();
    let mut indented = lines.next().unwrap_or_default().to_string();
    for line in lines {
        indented.push('\n');
        if !line.is_empty() {
            indented.push_str(&padding);
        }
        indented.push_str(line);
    }
    Ok(indented)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_manifest_file_filter() {
        assert!(is_manifest_file(Path::new("target/kubernetes/kubernetes.yml")));
        assert!(is_manifest_file(Path::new("openshift.YAML")));
        assert!(!is_manifest_file(Path::new("kubernetes.json")));
        assert!(!is_manifest_file(Path::new("yaml")));
    }

    #[test]
    fn test_parse_multi_document_stream() {
        let docs = parse_documents(
            "---\nkind: Service\nmetadata:\n  name: app\n---\n---\nkind: Deployment\nmetadata:\n  name: app\n",
        )
        .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].kind(), Some("Service"));
        assert_eq!(docs[1].name(), Some("app"));
        assert_eq!(docs[1].template_file_name().as_deref(), Some("deployment.yaml"));
    }

    #[test]
    fn test_expression_node() {
        let node = expression("{{ .Values.app.image }}");
        assert!(is_expression(&node));
        assert!(!is_expression(&Value::from("{{ .Values.app.image }}")));
        assert_eq!(values_expression("app.image"), "{{ .Values.app.image }}");
    }

    #[test]
    fn test_expressions_are_written_unquoted() {
        let mut doc = parse("spec:\n  replicas: 3\n  selector: {}\n");
        doc["spec"]["replicas"] = expression("{{ .Values.app.replicas }}");

        let yaml = to_template_yaml(&doc).unwrap();
        insta::assert_snapshot!(yaml, @r"
        spec:
          replicas: {{ .Values.app.replicas }}
          selector: {}
        ");
    }

    #[test]
    fn test_emit_sequences() {
        let doc = parse(
            r#"
spec:
  containers:
    - name: app
      image: nginx
      ports:
        - containerPort: 8080
          protocol: TCP
      args: ["serve", "--verbose"]
  volumes: []
"#,
        );

        let yaml = to_template_yaml(&doc).unwrap();
        insta::assert_snapshot!(yaml, @r"
        spec:
          containers:
          - name: app
            image: nginx
            ports:
            - containerPort: 8080
              protocol: TCP
            args:
            - serve
            - --verbose
          volumes: []
        ");

        assert_eq!(serde_yaml::from_str::<Value>(&yaml).unwrap(), doc);
    }

    #[test]
    fn test_emit_multiline_string() {
        let doc = parse("data:\n  config: |\n    a: 1\n    b: 2\n");
        let yaml = to_template_yaml(&doc).unwrap();

        assert_eq!(serde_yaml::from_str::<Value>(&yaml).unwrap(), doc);
    }
}
