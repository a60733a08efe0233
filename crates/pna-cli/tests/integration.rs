#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn pna(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pna").unwrap();
    cmd.current_dir(dir.path()).env("PNA_ROOT", dir.path());
    cmd
}

/// Initialized cell with a fast runner so queue tests finish quickly.
fn init_cell(dir: &TempDir) {
    pna(dir).arg("init").assert().success();
    std::fs::write(
        dir.path().join(".pna/config.yaml"),
        "driver:\n  type: simulated\nrunner:\n  interval_ms: 5\n",
    )
    .unwrap();
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

// ---------------------------------------------------------------------------
// pna init / ops
// ---------------------------------------------------------------------------

#[test]
fn init_creates_cell_layout() {
    let dir = TempDir::new().unwrap();
    pna(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .pna/config.yaml"));

    assert!(dir.path().join(".pna/config.yaml").exists());
    assert!(dir.path().join(".pna/macros").is_dir());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    pna(&dir).arg("init").assert().success();
    pna(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  .pna/config.yaml"));
}

#[test]
fn init_with_bridge_writes_http_driver() {
    let dir = TempDir::new().unwrap();
    pna(&dir)
        .args(["init", "--bridge", "http://10.0.0.5:8000"])
        .assert()
        .success();
    let cfg = std::fs::read_to_string(dir.path().join(".pna/config.yaml")).unwrap();
    assert!(cfg.contains("type: http"));
    assert!(cfg.contains("http://10.0.0.5:8000"));
}

#[test]
fn ops_lists_catalogue() {
    let dir = TempDir::new().unwrap();
    pna(&dir)
        .arg("ops")
        .assert()
        .success()
        .stdout(predicate::str::contains("screwIn"))
        .stdout(predicate::str::contains("composite"));

    let ops = json_stdout(pna(&dir).args(["ops", "gripper", "--json"]));
    let ops = ops.as_array().unwrap();
    assert_eq!(ops.len(), 6);
    assert!(ops.iter().all(|op| op["device"] == "gripper"));
}

#[test]
fn commands_need_init() {
    let dir = TempDir::new().unwrap();
    pna(&dir)
        .args(["job", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pna init"));
}

// ---------------------------------------------------------------------------
// pna dispatch
// ---------------------------------------------------------------------------

#[test]
fn dispatch_runs_operation() {
    let dir = TempDir::new().unwrap();
    init_cell(&dir);
    pna(&dir)
        .args(["dispatch", "rig", "goto", "x=10", "y=5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rig.goto: ok"));
}

#[test]
fn dispatch_unknown_operation_fails() {
    let dir = TempDir::new().unwrap();
    init_cell(&dir);
    pna(&dir)
        .args(["dispatch", "arm", "dance"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown operation: arm.dance"));
}

#[test]
fn dispatch_bad_geometry_fails() {
    let dir = TempDir::new().unwrap();
    init_cell(&dir);
    pna(&dir)
        .args(["dispatch", "screwdriver", "screwIn", "rotPs=0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid geometry"));
}

// ---------------------------------------------------------------------------
// pna job
// ---------------------------------------------------------------------------

#[test]
fn job_add_list_update_delete() {
    let dir = TempDir::new().unwrap();
    init_cell(&dir);

    pna(&dir)
        .args(["job", "add", "rig", "goto", "x=3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added job 1: rig.goto"));
    pna(&dir).args(["job", "add"]).assert().success();

    let job = json_stdout(pna(&dir).args(["job", "get", "1", "--json"]));
    assert_eq!(job["params"]["x"], 3);
    assert_eq!(job["params"]["speed"], 2000);

    let job = json_stdout(pna(&dir).args([
        "job", "update", "2", "--device", "gripper", "--op", "close", "--json",
    ]));
    assert_eq!(job["operation"], "close");
    assert_eq!(job["params"]["time_s"], 1);

    pna(&dir)
        .args(["job", "list", "--filter", "grip"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gripper.close"))
        .stdout(predicate::str::contains("rig.goto").not());

    pna(&dir).args(["job", "delete", "1"]).assert().success();
    let page = json_stdout(pna(&dir).args(["job", "list", "--json"]));
    assert_eq!(page["total"], 1);

    pna(&dir)
        .args(["job", "get", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("job not found: 1"));
}

#[test]
fn job_update_rejects_bad_status() {
    let dir = TempDir::new().unwrap();
    init_cell(&dir);
    pna(&dir).args(["job", "add"]).assert().success();
    pna(&dir)
        .args(["job", "update", "1", "--status", "paused"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid job status"));
}

// ---------------------------------------------------------------------------
// pna queue
// ---------------------------------------------------------------------------

#[test]
fn queue_step_progress_and_reset() {
    let dir = TempDir::new().unwrap();
    init_cell(&dir);
    pna(&dir).args(["job", "add", "rig", "unlock"]).assert().success();
    pna(&dir).args(["job", "add"]).assert().success();

    pna(&dir)
        .args(["queue", "step"])
        .assert()
        .success()
        .stdout(predicate::str::contains("job 1 rig.unlock done (1/2)"));
    pna(&dir)
        .args(["queue", "step"])
        .assert()
        .success()
        .stdout(predicate::str::contains("failed: job has no device class"));
    pna(&dir)
        .args(["queue", "step"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queue empty"));

    pna(&dir)
        .args(["queue", "reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reset 2 job(s)"));
    pna(&dir)
        .args(["queue", "progress"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0/2"));
}

#[test]
fn queue_run_drains_in_order() {
    let dir = TempDir::new().unwrap();
    init_cell(&dir);
    for op in ["open", "close", "open"] {
        pna(&dir).args(["job", "add", "gripper", op]).assert().success();
    }

    pna(&dir)
        .args(["queue", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("job 3 done (3/3)"))
        .stdout(predicate::str::contains("Queue stopped at 3/3"));
}

// ---------------------------------------------------------------------------
// pna macro
// ---------------------------------------------------------------------------

#[test]
fn macro_record_show_import_replay() {
    let dir = TempDir::new().unwrap();
    init_cell(&dir);

    pna(&dir)
        .args([
            "macro",
            "record",
            "pick",
            "--step",
            "rig.goto x=10 y=5",
            "--step",
            "gripper.close",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recorded 2 step(s)"));
    assert!(dir.path().join(".pna/macros/pick.json").exists());

    pna(&dir)
        .args(["macro", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pick"));

    let steps = json_stdout(pna(&dir).args(["macro", "show", "pick", "--json"]));
    assert_eq!(steps[0]["operation"], "goto");
    assert_eq!(steps[0]["params"]["x"], 10);
    assert_eq!(steps[1]["operation"], "close");

    pna(&dir)
        .args(["macro", "import", "pick"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 job(s)"));
    let page = json_stdout(pna(&dir).args(["job", "list", "--json"]));
    assert_eq!(page["total"], 2);
    assert_eq!(page["jobs"][1]["operation"], "close");

    pna(&dir)
        .args(["macro", "replay", "pick"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Replayed 2/2"));
}

#[test]
fn macro_show_missing_fails() {
    let dir = TempDir::new().unwrap();
    init_cell(&dir);
    pna(&dir)
        .args(["macro", "show", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}
