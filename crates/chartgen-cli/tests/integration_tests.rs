//! Integration tests for the chartgen binary

use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Helper to run chartgen command
fn chartgen(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_chartgen"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute chartgen")
}

const MANIFEST: &str = r#"---
apiVersion: v1
kind: Service
metadata:
  name: shop
spec:
  ports:
    - port: 80
      targetPort: 8080
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: shop
spec:
  replicas: 1
  template:
    spec:
      containers:
        - name: shop
          image: registry.example.com/shop:2.3.0
"#;

const CONFIG: &str = r#"name: shop
description: Online shop
values:
  - property: shop.image
    paths:
      - spec.template.spec.containers[0].image
  - property: shop.replicas
    paths:
      - (kind == Deployment).spec.replicas
    value: 2
  - property: shop.replicas
    paths:
      - (kind == Deployment).spec.replicas
    value: 5
    profile: staging
"#;

struct Project {
    temp: TempDir,
}

impl Project {
    fn new(config: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let manifests = temp.path().join("kubernetes");
        std::fs::create_dir_all(&manifests).unwrap();
        std::fs::write(manifests.join("kubernetes.yml"), MANIFEST).unwrap();
        std::fs::write(manifests.join("kubernetes.json"), "{}").unwrap();
        std::fs::write(temp.path().join("chartgen.yaml"), config).unwrap();
        Self { temp }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.temp.path().join(relative)
    }

    fn arg(&self, relative: &str) -> String {
        self.path(relative).display().to_string()
    }

    fn generate(&self, extra: &[&str]) -> std::process::Output {
        let config = self.arg("chartgen.yaml");
        let manifests = self.arg("kubernetes");
        let output = self.arg("helm");
        let mut args: Vec<&str> = vec![
            "generate",
            "--config",
            config.as_str(),
            "--manifests",
            manifests.as_str(),
            "--output-dir",
            output.as_str(),
            "--default-version",
            "1.2.3",
        ];
        args.extend_from_slice(extra);
        chartgen(&args)
    }

    fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).unwrap()
    }
}

fn yaml(content: &str) -> serde_yaml::Value {
    serde_yaml::from_str(content).unwrap()
}

mod generate_command {
    use super::*;

    #[test]
    fn test_generate_chart() {
        let project = Project::new(CONFIG);

        let output = project.generate(&[]);

        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Generating"));
        assert!(stdout.contains("shop"));

        let chart = yaml(&project.read("helm/shop/Chart.yaml"));
        assert_eq!(chart["name"], serde_yaml::Value::from("shop"));
        assert_eq!(chart["version"], serde_yaml::Value::from("1.2.3"));
        assert_eq!(chart["description"], serde_yaml::Value::from("Online shop"));

        let values = yaml(&project.read("helm/shop/values.yaml"));
        assert_eq!(
            values["shop"]["image"],
            serde_yaml::Value::from("registry.example.com/shop:2.3.0")
        );
        assert_eq!(values["shop"]["replicas"], serde_yaml::Value::from(2));

        let staging = yaml(&project.read("helm/shop/values.staging.yaml"));
        assert_eq!(staging["shop"]["replicas"], serde_yaml::Value::from(5));
        assert_eq!(
            staging["shop"]["image"],
            serde_yaml::Value::from("registry.example.com/shop:2.3.0")
        );

        let deployment = project.read("helm/shop/templates/deployment.yaml");
        assert!(deployment.contains("replicas: {{ .Values.shop.replicas }}"));
        assert!(deployment.contains("image: {{ .Values.shop.image }}"));
        assert!(project.path("helm/shop/templates/service.yaml").is_file());
        assert!(project.path("helm/shop/templates/NOTES.txt").is_file());
        assert!(project.path("helm/shop/charts").is_dir());
    }

    #[test]
    fn test_generate_package() {
        let project = Project::new(CONFIG);

        let output = project.generate(&["--package"]);

        assert!(output.status.success());
        assert!(project.path("helm/shop-1.2.3.tar.gz").is_file());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Packaged"));
    }

    #[test]
    fn test_generate_json_output() {
        let project = Project::new(CONFIG);

        let output = project.generate(&["--json"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        let json: serde_json::Value =
            serde_json::from_str(&stdout).expect("Output should be valid JSON");

        assert_eq!(json["chart"], "shop");
        let artifacts = json["artifacts"].as_array().unwrap();
        assert!(artifacts.iter().any(|a| {
            a["path"].as_str().unwrap().ends_with("values.yaml") && a["kind"] == "file"
        }));
        assert!(artifacts.iter().any(|a| a["kind"] == "directory"));
    }

    #[test]
    fn test_generate_with_input_dir() {
        let project = Project::new(CONFIG);
        let input = project.path("helm-input");
        std::fs::create_dir_all(input.join("templates")).unwrap();
        std::fs::write(input.join("README.md"), "# Shop").unwrap();
        std::fs::write(input.join("values.yaml"), "shop:\n  replicas: 7\n").unwrap();
        std::fs::write(
            input.join("templates").join("_helpers.tpl"),
            "{{- define \"shop.name\" }}shop{{- end }}\n",
        )
        .unwrap();

        let input_arg = input.display().to_string();
        let output = project.generate(&["--input-dir", &input_arg]);

        assert!(output.status.success());
        assert_eq!(project.read("helm/shop/README.md"), "# Shop");
        assert!(project.path("helm/shop/templates/_helpers.tpl").is_file());
        let values = yaml(&project.read("helm/shop/values.yaml"));
        assert_eq!(values["shop"]["replicas"], serde_yaml::Value::from(7));
    }

    #[test]
    fn test_generate_disabled() {
        let project = Project::new("name: shop\nenabled: false\n");

        let output = project.generate(&[]);

        assert!(output.status.success());
        assert!(!project.path("helm").exists());
    }

    #[test]
    fn test_generate_missing_name() {
        let project = Project::new("description: no name\n");

        let output = project.generate(&[]);

        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Helm Chart name is required"));
    }

    #[test]
    fn test_generate_missing_config() {
        let project = Project::new(CONFIG);
        let missing = project.arg("missing.yaml");
        let manifests = project.arg("kubernetes");

        let output = chartgen(&["generate", "--config", &missing, "--manifests", &manifests]);

        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Failed to load chart configuration"));
    }

    #[test]
    fn test_generate_skip_dependency_build() {
        let config = format!(
            "{}dependencies:\n  - name: postgresql\n    version: 12.1.0\n    repository: https://charts.bitnami.com/bitnami\n    condition: postgresql.enabled\n",
            CONFIG
        );
        let project = Project::new(&config);

        let output = project.generate(&["--skip-dependency-build"]);

        assert!(output.status.success());
        let values = yaml(&project.read("helm/shop/values.yaml"));
        assert_eq!(values["postgresql"]["enabled"], serde_yaml::Value::Bool(true));
    }

    #[test]
    fn test_generate_warns_on_shadowed_value() {
        let config = format!(
            "{}  - property: shop.db\n    value: external\n  - property: shop.db.enabled\n    value: true\n",
            CONFIG
        );
        let project = Project::new(&config);

        let output = project.generate(&[]);

        assert!(output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("shop.db.enabled"), "stderr: {}", stderr);
        assert!(stderr.contains("is dropped"));
        let values = yaml(&project.read("helm/shop/values.yaml"));
        assert_eq!(values["shop"]["db"]["enabled"], serde_yaml::Value::Bool(true));
    }

    #[test]
    fn test_generate_missing_manifests() {
        let project = Project::new(CONFIG);
        let config = project.arg("chartgen.yaml");
        let missing = project.arg("nowhere");

        let output = chartgen(&["generate", "--config", &config, "--manifests", &missing]);

        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Manifest path not found"));
    }
}

#[test]
fn test_help() {
    let output = chartgen(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("generate"));
}
