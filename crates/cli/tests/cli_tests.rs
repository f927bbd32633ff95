// Integration tests for the appraise binary.
//
// stdout carries exactly one JSON value for `run` and `lint --json`;
// diagnostics go to stderr.
//
// Run with: cargo test -p appraise-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../engine/tests/fixtures")
        .join(name)
}

/// Temp dir holding a settings file with `body`.
fn settings(body: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, body).unwrap();
    (dir, path)
}

fn appraise(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_appraise"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run appraise")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be one JSON value: {}\n{}", e, stdout))
}

fn code(output: &Output) -> i32 {
    output.status.code().expect("exit code")
}

// ===========================================================================
// appraise run
// ===========================================================================

#[test]
fn run_wqs_prints_final_block() {
    let (_dir, config) = settings("");
    let output = appraise(&config, &["run", fixture("wqs_land.json").to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let val = stdout_json(&output);
    assert_eq!(val["method"], "wqs");
    assert_eq!(val["values"]["finalValue"], 72000.0);
    assert_eq!(val["values"]["finalValueRounded"], 70000.0);
    assert_eq!(val["values"]["coefficientOfDecision"], "1.0000");
}

#[test]
fn run_sale_grid_with_report() {
    let (_dir, config) = settings("");
    let output = appraise(
        &config,
        &["run", fixture("sale_grid_building.json").to_str().unwrap(), "--report"],
    );
    assert_eq!(code(&output), 0);

    let val = stdout_json(&output);
    assert_eq!(val["method"], "sale_grid");
    assert_eq!(val["values"]["finalValue"], 21922.38);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[recalc]"), "stderr: {}", stderr);
    assert!(stderr.contains("converged="), "stderr: {}", stderr);
}

#[test]
fn run_missing_file_exits_3() {
    let (dir, config) = settings("");
    let missing = dir.path().join("nope.json");
    let output = appraise(&config, &["run", missing.to_str().unwrap()]);
    assert_eq!(code(&output), 3);
    assert!(output.stdout.is_empty());
}

#[test]
fn run_bad_json_exits_4() {
    let (dir, config) = settings("");
    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, r#"{"method": "dcf"}"#).unwrap();
    let output = appraise(&config, &["run", bad.to_str().unwrap()]);
    assert_eq!(code(&output), 4);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("hint:"), "stderr: {}", stderr);
}

#[test]
fn run_duplicate_survey_exits_5() {
    let (dir, config) = settings("");
    let dup = dir.path().join("dup.json");
    std::fs::write(
        &dup,
        r#"{
            "method": "sale_grid",
            "template": {"templateCode": "T", "collateralTypeId": "B"},
            "surveys": [{"id": "A"}, {"id": "A"}],
            "property": {"collateralType": "B"}
        }"#,
    )
    .unwrap();
    let output = appraise(&config, &["run", dup.to_str().unwrap()]);
    assert_eq!(code(&output), 5);
}

// ===========================================================================
// appraise lint
// ===========================================================================

#[test]
fn lint_generated_worksheets_are_clean() {
    let (_dir, config) = settings("");
    for name in ["wqs_land.json", "sale_grid_building.json"] {
        let output = appraise(&config, &["lint", fixture(name).to_str().unwrap(), "--json"]);
        assert_eq!(code(&output), 0, "{}: {}", name, String::from_utf8_lossy(&output.stderr));

        let val = stdout_json(&output);
        assert_eq!(val["clean"], true);
        assert!(val["rules"].as_u64().unwrap() > 0);
        assert_eq!(val["duplicate_targets"].as_array().unwrap().len(), 0);
        assert_eq!(val["cycles"].as_array().unwrap().len(), 0);
        assert_eq!(val["forward_reads"].as_array().unwrap().len(), 0);
    }
}

#[test]
fn lint_text_output() {
    let (_dir, config) = settings("");
    let output = appraise(&config, &["lint", fixture("wqs_land.json").to_str().unwrap()]);
    assert_eq!(code(&output), 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("rules, settles in"), "stdout: {}", stdout);
}

// ===========================================================================
// settings
// ===========================================================================

#[test]
fn invalid_settings_exit_11() {
    let (_dir, config) = settings("[engine]\nmax_passes = 40\n");
    let output = appraise(&config, &["run", fixture("wqs_land.json").to_str().unwrap()]);
    assert_eq!(code(&output), 11);
    assert!(output.stdout.is_empty());
}

#[test]
fn missing_settings_file_exit_10() {
    let dir = TempDir::new().unwrap();
    let output = appraise(
        &dir.path().join("absent.toml"),
        &["run", fixture("wqs_land.json").to_str().unwrap()],
    );
    assert_eq!(code(&output), 10);
}

#[test]
fn max_passes_flag_overrides_settings() {
    let (_dir, config) = settings("[engine]\nmax_passes = 3\n");
    let wqs = fixture("wqs_land.json");
    let output = appraise(&config, &["run", wqs.to_str().unwrap(), "--max-passes", "5"]);
    assert_eq!(code(&output), 0);

    let output = appraise(&config, &["lint", wqs.to_str().unwrap(), "--max-passes", "5"]);
    assert_eq!(code(&output), 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("(limit 5)"), "stdout: {}", stdout);
}

#[test]
fn max_passes_flag_out_of_range_exits_2() {
    let (_dir, config) = settings("");
    let wqs = fixture("wqs_land.json");
    for (command, passes) in [("run", "0"), ("run", "100"), ("lint", "0"), ("lint", "17")] {
        let output = appraise(&config, &[command, wqs.to_str().unwrap(), "--max-passes", passes]);
        assert_eq!(code(&output), 2, "{} --max-passes {}", command, passes);
        assert!(output.stdout.is_empty());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("--max-passes must be between 1 and 16"), "stderr: {}", stderr);
    }
}

#[test]
fn bad_default_settings_warn_and_fall_back() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join("appraise");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("settings.toml"), "[engine]\nmax_passes = 40\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_appraise"))
        .args(["run", fixture("wqs_land.json").to_str().unwrap()])
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("APPRAISE_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("run appraise");

    assert_eq!(code(&output), 0);
    assert_eq!(stdout_json(&output)["values"]["finalValue"], 72000.0);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("using default settings"), "stderr: {}", stderr);
}
