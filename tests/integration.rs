use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn helm_dump_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("helm-dump");
    path
}

const DEPLOYMENT: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: '{{ include \"web.fullname\" . }}'
  annotations:
    helm-dump/name: web
spec:
  # scaled by the HPA in production
  replicas: 3
  template:
    spec:
      containers:
      - name: web
        image: nginx:1.25.3
";

const SERVICE: &str = "\
apiVersion: v1
kind: Service
metadata:
  name: web
  annotations:
    helm-dump/name: web
spec:
  type: ClusterIP
  ports:
  - port: 80
";

fn setup_chart() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("web");
    fs::create_dir_all(root.join("templates")).unwrap();

    fs::write(
        root.join("Chart.yaml"),
        "apiVersion: v2\nname: web\nversion: 0.1.0\n",
    )
    .unwrap();
    fs::write(root.join("values.yaml"), "image:\n  pullPolicy: IfNotPresent\n").unwrap();
    fs::write(root.join("templates/deployment.yaml"), DEPLOYMENT).unwrap();
    fs::write(root.join("templates/service.yaml"), SERVICE).unwrap();
    fs::write(
        root.join("templates/_helpers.tpl"),
        "{{- define \"web.fullname\" -}}{{ .Release.Name }}-web{{- end -}}\n",
    )
    .unwrap();
    fs::write(root.join("templates/NOTES.txt"), "Thanks for installing.\n").unwrap();

    (tmp, root)
}

fn run_helm_dump(args: &[&str]) -> (String, String, bool) {
    let binary = helm_dump_binary();
    let output = Command::new(&binary)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run helm-dump binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e))
}

fn values(dir: &Path) -> serde_json::Value {
    serde_yaml::from_str(&read(&dir.join("values.yaml"))).unwrap()
}

#[test]
fn test_version_prints_json() {
    let (stdout, stderr, success) = run_helm_dump(&["version"]);
    assert!(success, "version failed: {}", stderr);
    let info: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(info["version"], env!("CARGO_PKG_VERSION"));
    assert!(info.get("commit").is_some());
}

#[test]
fn test_move_to_values_in_place() {
    let (_tmp, root) = setup_chart();
    let root_str = root.to_str().unwrap();

    let (stdout, stderr, success) = run_helm_dump(&[
        "move-to-values",
        "apps/v1",
        "Deployment",
        ".spec.replicas",
        "{{ resourceName . }}.replicas",
        "-d",
        root_str,
    ]);
    assert!(success, "move-to-values failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("rewritten: 1"), "{}", stdout);
    assert!(stdout.contains("patches applied: 1"));
    assert!(stdout.contains("skipped: 2"));
    assert!(stdout.contains("ok"));

    let deployment = read(&root.join("templates/deployment.yaml"));
    assert!(deployment.contains(
        "  # scaled by the HPA in production\n  replicas: {{ .Values.web.replicas }}\n  template:\n"
    ));
    assert_eq!(read(&root.join("templates/service.yaml")), SERVICE);
    assert_eq!(
        values(&root),
        serde_json::json!({
            "image": { "pullPolicy": "IfNotPresent" },
            "web": { "replicas": "3" }
        })
    );

    // The pristine copy is cached under the chart.
    let cached = fs::read_dir(root.join(".helm-dump")).unwrap().count();
    assert_eq!(cached, 2);
}

#[test]
fn test_move_to_values_to_output_directory() {
    let (tmp, root) = setup_chart();
    let out = tmp.path().join("out");

    let (stdout, stderr, success) = run_helm_dump(&[
        "move-to-values",
        "v1",
        "Service",
        ".spec.type",
        "{{ resourceName . }}.service.type",
        "-d",
        root.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "--cache",
        "off",
    ]);
    assert!(success, "stdout={}, stderr={}", stdout, stderr);

    // Written under the chart's name.
    let chart = out.join("web");
    assert!(stdout.contains(&format!("to {}", chart.display())), "{}", stdout);
    assert!(read(&chart.join("templates/service.yaml")).contains("  type: {{ .Values.web.service.type }}\n"));
    assert!(chart.join("Chart.yaml").is_file());
    assert!(chart.join("templates/_helpers.tpl").is_file());
    assert!(chart.join("templates/NOTES.txt").is_file());
    assert!(!out.join("values.yaml").exists());
    assert_eq!(values(&chart)["web"]["service"]["type"], "ClusterIP");

    // The source chart is untouched and nothing was cached.
    assert_eq!(read(&root.join("templates/service.yaml")), SERVICE);
    assert!(!root.join(".helm-dump").exists());
}

#[test]
fn test_rules_from_config() {
    let (tmp, root) = setup_chart();
    let out = tmp.path().join("out");
    let config_path = tmp.path().join("helm-dump.toml");
    fs::write(
        &config_path,
        format!(
            r#"[project]
root = "{}"
output_dir = "{}"

[extraction]
merge_existing_values = false

[[rules]]
api_version = "apps/v1"
kind = "Deployment"
source_path = ".spec.replicas"
key_template = "{{{{ resourceName . }}}}.replicas"

[[rules]]
api_version = "apps/v1"
kind = "Deployment"
source_path = "{{.spec.template.spec.containers[0].image}}"
key_template = "{{{{ resourceName . }}}}.image"
"#,
            root.display(),
            out.display()
        ),
    )
    .unwrap();

    let (stdout, stderr, success) =
        run_helm_dump(&["--config", config_path.to_str().unwrap(), "move-to-values"]);
    assert!(success, "stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("patches applied: 2"));
    let chart = out.join("web");
    assert_eq!(
        values(&chart),
        serde_json::json!({ "web": { "replicas": "3", "image": "nginx:1.25.3" } })
    );
    let deployment = read(&chart.join("templates/deployment.yaml"));
    assert!(deployment.contains("        image: {{ .Values.web.image }}\n"));
}

#[test]
fn test_failures_are_reported_and_strict_fails() {
    let (_tmp, root) = setup_chart();
    let root_str = root.to_str().unwrap();
    let args = [
        "move-to-values",
        "apps/v1",
        "Deployment",
        ".spec.strategy",
        "{{ resourceName . }}.strategy",
        "-d",
        root_str,
        "--report",
        "json",
    ];

    let (stdout, stderr, success) = run_helm_dump(&args);
    assert!(success, "non-strict run should succeed: {}", stderr);
    assert!(stdout.contains("diagnostics: 1"));
    assert!(!stdout.lines().any(|l| l == "ok"));
    let diagnostic = stderr
        .lines()
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .find(|v| v["event"] == "diagnostic")
        .expect("a diagnostic event on stderr");
    assert_eq!(diagnostic["diagnostic"]["stage"], "read");
    assert_eq!(diagnostic["diagnostic"]["document"], "templates/deployment.yaml");

    let mut strict = args.to_vec();
    strict.push("--strict");
    let (_, _, success) = run_helm_dump(&strict);
    assert!(!success, "--strict should fail on diagnostics");
}

#[test]
fn test_conflicting_values_fail_strict() {
    let (_tmp, root) = setup_chart();
    for (name, replicas) in [("a.yaml", 1), ("b.yaml", 5)] {
        fs::write(
            root.join("templates").join(name),
            format!(
                "apiVersion: apps/v1\nkind: StatefulSet\nmetadata:\n  name: db\nspec:\n  replicas: {}\n",
                replicas
            ),
        )
        .unwrap();
    }

    let (stdout, stderr, success) = run_helm_dump(&[
        "move-to-values",
        "apps/v1",
        "StatefulSet",
        ".spec.replicas",
        "{{ resourceName . }}.replicas",
        "-d",
        root.to_str().unwrap(),
        "--strict",
    ]);
    assert!(!success, "stdout={}", stdout);
    assert!(stdout.contains("diagnostics: 1"), "{}", stdout);
    assert!(stderr.contains("unknown.replicas"), "{}", stderr);

    assert_eq!(values(&root)["unknown"]["replicas"], "1");
    assert!(read(&root.join("templates/a.yaml")).contains("  replicas: {{ .Values.unknown.replicas }}\n"));
    assert!(read(&root.join("templates/b.yaml")).contains("  replicas: 5\n"));
}

#[test]
fn test_partial_positionals_are_rejected() {
    let (_tmp, root) = setup_chart();
    let (_, stderr, success) = run_helm_dump(&[
        "move-to-values",
        "apps/v1",
        "Deployment",
        "-d",
        root.to_str().unwrap(),
    ]);
    assert!(!success);
    assert!(stderr.contains("API_VERSION KIND FIELD TEMPLATE"));
}

#[test]
fn test_missing_chart_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_helm_dump(&[
        "move-to-values",
        "v1",
        "Service",
        ".spec.type",
        "svc.type",
        "-d",
        tmp.path().to_str().unwrap(),
    ]);
    assert!(!success);
    assert!(stderr.contains("Chart.yaml"));
}
