use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

/// 在隔离目录里运行 `textcad`，不受外部 `TEXTCAD_*` 变量影响。
fn textcad(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("textcad").unwrap();
    cmd.current_dir(dir)
        .env_remove("TEXTCAD_CONFIG")
        .env_remove("TEXTCAD_PROVIDER")
        .env_remove("TEXTCAD_MODEL")
        .env_remove("TEXTCAD_DEFAULT_UNITS")
        .env("TEXTCAD_LOG", "warn");
    cmd
}

#[test]
fn canonical_circle_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.dxf");

    textcad(dir.path())
        .args(["--cmd", "draw circle r=50 at (100,100)", "--non-interactive"])
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote 1 entities"));

    let dxf = fs::read_to_string(&out).unwrap();
    assert!(dxf.contains("\nCIRCLE\n"));
    assert!(dxf.contains("\n40\n50\n"));
}

#[test]
fn utterances_from_stdin_share_cursor() {
    let dir = tempfile::tempdir().unwrap();

    textcad(dir.path())
        .write_stdin("draw line from (0,0) to (10,0)\ncircle radius 2 at rel(5,5)\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote 2 entities"));

    let dxf = fs::read_to_string(dir.path().join("outputs/cli_output.dxf")).unwrap();
    assert!(dxf.contains("\nLINE\n"));
    assert!(dxf.contains("CIRCLE\n8\nA-GEOM\n10\n15\n20\n5\n"));
}

#[test]
fn empty_bundle_exits_with_two() {
    let dir = tempfile::tempdir().unwrap();

    textcad(dir.path())
        .args(["--cmd", "hello there"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no entities produced"));
    assert!(!dir.path().join("outputs").exists());
}

#[test]
fn failed_utterances_exit_with_one() {
    let dir = tempfile::tempdir().unwrap();

    textcad(dir.path())
        .args(["--cmd", "hello there", "--no-ai"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[E100]"));

    textcad(dir.path())
        .args(["--cmd", "draw circle r=5 at (1,a)", "--no-ai"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[E101]"));
}

#[test]
fn partial_failure_still_writes_drawing() {
    let dir = tempfile::tempdir().unwrap();

    textcad(dir.path())
        .args([
            "--cmd",
            "draw rect w=10 at (0,0)",
            "--cmd",
            "draw rect w=10 h=5 center (0,0)",
            "--no-ai",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("[E103]"));

    assert!(dir.path().join("outputs/cli_output.dxf").exists());
}

#[test]
fn config_file_sets_units_output_and_layer() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("textcad.toml");
    fs::write(
        &config,
        r#"
        [units]
        default = "in"

        [output]
        path = "custom/out.dxf"
        layer = "NOTES"
        "#,
    )
    .unwrap();

    textcad(dir.path())
        .args(["--cmd", "draw circle r=1 at (0,0)", "--no-ai"])
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    let dxf = fs::read_to_string(dir.path().join("custom/out.dxf")).unwrap();
    assert!(dxf.contains("\n40\n25.4\n"));
    assert!(dxf.contains("\n8\nNOTES\n"));
}

#[test]
fn default_config_is_discovered_in_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("config")).unwrap();
    fs::write(
        dir.path().join("config/default.toml"),
        "[output]\npath = \"found.dxf\"\n",
    )
    .unwrap();

    textcad(dir.path())
        .args(["--cmd", "draw circle r=5 at (0,0)"])
        .assert()
        .success();
    assert!(dir.path().join("found.dxf").exists());
}

#[test]
fn save_as_names_the_output_file() {
    let dir = tempfile::tempdir().unwrap();

    textcad(dir.path())
        .args(["--cmd", "draw a 10mm circle at (5,5) save as plan.dxf", "--no-ai"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plan.dxf"));
    assert!(dir.path().join("outputs/plan.dxf").exists());
}

#[test]
fn missing_config_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();

    textcad(dir.path())
        .args(["--cmd", "draw circle r=5 at (0,0)", "--config", "nope.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope.toml"));
}

#[test]
fn unsupported_default_unit_is_fatal() {
    let dir = tempfile::tempdir().unwrap();

    textcad(dir.path())
        .env("TEXTCAD_DEFAULT_UNITS", "furlong")
        .args(["--cmd", "draw circle r=5 at (0,0)"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("furlong"));
}

#[test]
fn project_defaults_persist_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("textcad.toml");
    fs::write(
        &config,
        "[memory]\nproject_id = \"site-a\"\nstore_path = \"state/memory.json\"\n",
    )
    .unwrap();

    textcad(dir.path())
        .args(["--cmd", "draw circle r=7 at (0,0)", "--non-interactive"])
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    let stored = fs::read_to_string(dir.path().join("state/memory.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&stored).unwrap();
    assert!(json["site-a"]["circle.radius"].is_string() || json["site-a"]["circle.radius"].is_number());
}

#[test]
fn blank_interactive_answer_takes_default() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.dxf");

    textcad(dir.path())
        .args([
            "--cmd",
            r#"{"commands": [{"type": "draw_circle", "center": {"x": 1, "y": 1}}]}"#,
            "--interactive",
        ])
        .arg("--out")
        .arg(&out)
        .write_stdin("\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("What radius should the circle have?"));

    let dxf = fs::read_to_string(&out).unwrap();
    assert!(dxf.contains("\n40\n10\n"));
}

#[test]
fn out_of_range_coordinate_is_reported() {
    let dir = tempfile::tempdir().unwrap();

    textcad(dir.path())
        .args([
            "--cmd",
            "draw line from (79228162514264337593543950335,0) to rel(1,0)",
            "--cmd",
            "draw circle r=2 at (5,5)",
            "--no-ai",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("[E320]"))
        .stdout(predicate::str::contains("wrote 1 entities"));
}
