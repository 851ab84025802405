use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

// Fast dispatch and a short calibration so sim runs finish in seconds
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let store = dir.path().join("background.txt");
    let toml = format!(
        r#"
[dispatch]
arm_speed = 12000
dropoff_distance = 600
min_gap_ms = 200
first_swing_ms = 200

[calibration]
file = {store:?}
duration_ms = 300

[display]
# no periodic summaries during tests
interval_ms = 600000
"#,
        store = store.display().to_string()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn sorter(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sorter").unwrap();
    cmd.arg("--config").arg(cfg).arg("--log-level").arg("error");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
#[case(&["show-calibration"], 0, "background (defaults", "stdout")]
#[case(&["run", "--bogus"], 2, "unexpected argument", "stderr")]
#[case(&["run", "--sim-parts", "x"], 2, "invalid value", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let assert = sorter(&cfg).args(args).assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn factory_reset_is_shown_afterwards() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    sorter(&cfg).arg("factory-reset").assert().success();
    let stored = fs::read_to_string(dir.path().join("background.txt")).unwrap();
    assert_eq!(stored.lines().count(), 12);

    sorter(&cfg)
        .arg("show-calibration")
        .assert()
        .success()
        .stdout(predicate::str::contains("background (file"))
        .stdout(predicate::str::contains("upstream   low [20, 27, 19] high [23, 31, 23]"))
        .stdout(predicate::str::contains("downstream low [0, 0, 0] high [1, 2, 1]"));
}

#[rstest]
fn short_store_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    fs::write(dir.path().join("background.txt"), "1\n2\n3\n").unwrap();

    sorter(&cfg)
        .arg("show-calibration")
        .assert()
        .success()
        .stdout(predicate::str::contains("background (defaults"))
        .stdout(predicate::str::contains("upstream   low [16, 26, 28] high [19, 31, 35]"));
}

#[rstest]
fn calibrate_records_the_sim_background() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    sorter(&cfg)
        .arg("calibrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("background (calibrated"))
        .stdout(predicate::str::contains("upstream   low [17, 28, 31] high [17, 28, 31]"));
    let stored = fs::read_to_string(dir.path().join("background.txt")).unwrap();
    let values: Vec<i32> = stored.lines().map(|l| l.trim().parse().unwrap()).collect();
    assert_eq!(values, [17, 28, 31, 17, 28, 31, 1, 3, 10, 1, 3, 10]);
}

#[rstest]
fn invalid_config_is_humanized() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, "[scanner]\nspeed = 0\n").unwrap();

    sorter(&cfg)
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("What happened: Invalid configuration"))
        .stderr(predicate::str::contains("scanner.speed"));
}

#[rstest]
fn missing_config_file_is_an_error() {
    let dir = tempdir().unwrap();
    sorter(&dir.path().join("absent.toml"))
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("absent.toml"));
}

#[rstest]
fn run_sorts_the_sim_hopper() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    sorter(&cfg)
        .args(["run", "--sim-parts", "3", "--duration-ms", "60000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sorted: Black 2L"))
        .stdout(predicate::str::contains("sorted: Black 3L"))
        .stdout(predicate::str::contains("sorted: DBG 3L"))
        .stdout(predicate::str::contains("total sorted: 3"));
}

#[rstest]
fn run_stops_after_duration() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    sorter(&cfg)
        .args(["run", "--sim-parts", "0", "--duration-ms", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("total sorted: 0"));
}
