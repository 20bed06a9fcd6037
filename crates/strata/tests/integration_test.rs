use std::path::Path;
use std::process::Command;

fn fixture_path() -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    format!("{manifest_dir}/tests/fixtures/sample-cpp-project/")
}

fn strata_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_strata"));
    cmd.env("NO_COLOR", "1");
    cmd
}

fn copy_dir(from: &Path, to: &Path) {
    for entry in walkdir::WalkDir::new(from) {
        let entry = entry.unwrap();
        let target = to.join(entry.path().strip_prefix(from).unwrap());
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).unwrap();
        } else {
            std::fs::copy(entry.path(), &target).unwrap();
        }
    }
}

#[test]
fn test_analyze_sample_project() {
    let output = strata_cmd()
        .args(["analyze", &fixture_path()])
        .output()
        .expect("failed to run strata analyze");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(
        output.status.success(),
        "strata analyze failed: stdout={stdout}, stderr={stderr}"
    );
    assert!(
        stdout.contains("Strata - Legacy Codebase Triage"),
        "should contain header: {stdout}"
    );
    assert!(
        stdout.contains("src/PixelMapImpl.cc"),
        "should rank the renderer: {stdout}"
    );
    assert!(
        stdout.contains("gen/CharTables.cc: generated file"),
        "should list the generated file as skipped: {stdout}"
    );
    assert!(
        !stdout.contains("Scratch.cc"),
        "build directory should be excluded: {stdout}"
    );
    assert!(
        stdout.contains("Estimated rewrite effort"),
        "should print the total estimate: {stdout}"
    );
}

#[test]
fn test_analyze_json_output() {
    let output = strata_cmd()
        .args(["analyze", &fixture_path(), "--format", "json"])
        .output()
        .expect("failed to run strata analyze --format json");

    assert!(output.status.success(), "json analyze should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value =
        serde_json::from_str(&stdout).expect("output should be valid JSON");

    assert_eq!(value["summary"]["total_files"], 7);
    assert_eq!(value["summary"]["analyzed_files"], 6);
    assert_eq!(value["summary"]["skipped_files"], 1);

    let entities = &value["graph"]["entities"];
    assert_eq!(entities["IRenderer"]["layer"], "interface");
    assert_eq!(entities["GooList"]["layer"], "utility");
    assert_eq!(entities["PixelMapImpl"]["layer"], "derived");
    assert_eq!(entities["Annot"]["layer"], "core");
    assert_eq!(entities["AnnotLink"]["layer"], "derived");
    assert!(entities["CharTable"].is_null());

    let used_by = entities["Annot"]["used_by"].as_array().unwrap();
    assert!(used_by.iter().any(|v| v == "AnnotLink"));
    assert!(used_by.iter().any(|v| v == "Page"));

    assert_eq!(value["modules"]["gen/CharTables.cc"]["status"]["status"], "skipped");
}

#[test]
fn test_graph_includes() {
    let output = strata_cmd()
        .args(["graph", &fixture_path()])
        .output()
        .expect("failed to run strata graph");

    assert!(output.status.success(), "graph should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("digraph includes {"), "{stdout}");
    assert!(
        stdout.contains("src_PixelMapImpl_cc -> include_IRenderer_h;"),
        "should resolve includes across directories: {stdout}"
    );
    assert!(
        stdout.contains("src_Page_cc -> src_Page_h;"),
        "should resolve sibling includes: {stdout}"
    );
}

#[test]
fn test_graph_entities() {
    let output = strata_cmd()
        .args(["graph", &fixture_path(), "--entities"])
        .output()
        .expect("failed to run strata graph --entities");

    assert!(output.status.success(), "entity graph should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("digraph entities {"), "{stdout}");
    assert!(stdout.contains("subgraph cluster_interface"), "{stdout}");
    assert!(
        stdout.contains("PixelMapImpl -> IRenderer [arrowhead=empty];"),
        "{stdout}"
    );
    assert!(stdout.contains("PixelMapImpl -> GooList;"), "{stdout}");
}

#[test]
fn test_init_creates_config() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let output = strata_cmd()
        .args(["init"])
        .current_dir(dir.path())
        .output()
        .expect("failed to run strata init");

    assert!(output.status.success(), "init should succeed");

    let config_path = dir.path().join(".strata.toml");
    assert!(config_path.exists(), ".strata.toml should be created");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(
        content.contains("[classification]"),
        "should contain [classification] section"
    );
    assert!(
        content.contains("[admission]"),
        "should contain [admission] section"
    );
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    std::fs::write(dir.path().join(".strata.toml"), "# keep me\n").unwrap();

    let output = strata_cmd()
        .args(["init"])
        .current_dir(dir.path())
        .output()
        .expect("failed to run strata init");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already exists"), "{stderr}");
    let content = std::fs::read_to_string(dir.path().join(".strata.toml")).unwrap();
    assert_eq!(content, "# keep me\n");

    let output = strata_cmd()
        .args(["init", "--force"])
        .current_dir(dir.path())
        .output()
        .expect("failed to run strata init --force");
    assert!(output.status.success(), "init --force should succeed");
}

#[test]
fn test_missing_path_fails() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let missing = dir.path().join("does-not-exist");

    let output = strata_cmd()
        .args(["analyze", missing.to_str().unwrap()])
        .output()
        .expect("failed to run strata analyze");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "{stderr}");
}

#[test]
fn test_invalid_config_fails() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = dir.path().join("broken.toml");
    std::fs::write(&config, "[classification\n").unwrap();

    let output = strata_cmd()
        .args(["analyze", &fixture_path(), "--config", config.to_str().unwrap()])
        .output()
        .expect("failed to run strata analyze");

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_incremental_writes_cache() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    copy_dir(Path::new(&fixture_path()), dir.path());

    let first = strata_cmd()
        .args(["analyze", dir.path().to_str().unwrap(), "--incremental"])
        .output()
        .expect("failed to run strata analyze --incremental");
    assert!(first.status.success(), "first incremental run should succeed");
    assert!(dir.path().join(".strata/cache.json").exists());

    let second = strata_cmd()
        .args(["analyze", dir.path().to_str().unwrap(), "--incremental"])
        .output()
        .expect("failed to run strata analyze --incremental");
    assert!(second.status.success(), "cached run should succeed");

    let full = strata_cmd()
        .args(["analyze", dir.path().to_str().unwrap()])
        .output()
        .expect("failed to run strata analyze");
    assert_eq!(
        String::from_utf8_lossy(&second.stdout),
        String::from_utf8_lossy(&full.stdout)
    );
}
