use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use http_body_util::BodyExt;
use pna_core::config::Config;
use pna_core::driver::SimulatedDriver;
use pna_core::types::DeviceClass;
use pna_server::AppState;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Cell {
    dir: TempDir,
    app: axum::Router,
    sim: Arc<SimulatedDriver>,
}

/// A cell with a fast queue and a simulated bridge where `gripper.close`
/// always fails.
fn cell() -> Cell {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.runner.interval_ms = 5;
    config.save(dir.path()).unwrap();

    let sim = Arc::new(SimulatedDriver::new().failing(
        DeviceClass::Gripper,
        "close",
        Duration::ZERO,
        "jammed",
    ));
    let state = AppState::new(dir.path().to_path_buf(), config, sim.clone()).unwrap();
    Cell {
        dir,
        app: pna_server::build_router(state),
        sim,
    }
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            axum::body::Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => axum::body::Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None).await
}

async fn post(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(body)).await
}

async fn add_job(app: &axum::Router, device: &str, op: &str, params: serde_json::Value) -> u64 {
    let (status, job) = send(app, "POST", "/api/jobs", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = job["id"].as_u64().unwrap();
    let (status, _) = send(
        app,
        "PUT",
        &format!("/api/jobs/{id}"),
        Some(serde_json::json!({"device_class": device, "operation": op, "params": params})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    id
}

async fn wait_for_stop(app: &axum::Router) -> serde_json::Value {
    for _ in 0..200 {
        let (_, body) = get(app, "/api/runner").await;
        if body["state"] == "stopped" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queue did not stop");
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn operations_lists_catalogue_with_templates() {
    let c = cell();
    let (status, json) = get(&c.app, "/api/operations").await;
    assert_eq!(status, StatusCode::OK);

    let ops = json.as_array().unwrap();
    assert_eq!(ops.len(), 18);
    let goto = ops
        .iter()
        .find(|o| o["device"] == "rig" && o["operation"] == "goto")
        .unwrap();
    assert_eq!(goto["defaults"]["speed"], 2000);
    assert_eq!(goto["composite"], false);
}

#[tokio::test]
async fn dispatch_merges_params_and_reaches_the_driver() {
    let c = cell();
    let (status, json) = post(&c.app, "/api/dispatch/rig/goto", serde_json::json!({"x": 10})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(c.sim.call_keys(), vec!["rig.goto"]);
}

#[tokio::test]
async fn dispatch_error_statuses() {
    let c = cell();
    let (status, json) = post(&c.app, "/api/dispatch/rig/fly", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("rig.fly"));

    let (status, _) = post(&c.app, "/api/dispatch/toaster/goto", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&c.app, "/api/dispatch/gripper/close", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, _) = post(
        &c.app,
        "/api/dispatch/screwdriver/screwIn",
        serde_json::json!({"threadPitch": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// Recorder + macros
// ---------------------------------------------------------------------------

#[tokio::test]
async fn record_stop_and_load_into_queue() {
    let c = cell();
    let (status, json) = post(&c.app, "/api/recorder/start", serde_json::json!({"path": "pick"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "recording");

    let (status, _) = post(&c.app, "/api/recorder/start", serde_json::json!({"path": "other"})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    post(&c.app, "/api/dispatch/rig/goto", serde_json::json!({"x": 1})).await;
    // Failed dispatches are still recorded.
    post(&c.app, "/api/dispatch/gripper/close", serde_json::json!({})).await;

    let (_, json) = get(&c.app, "/api/recorder").await;
    assert_eq!(json["status"]["recorded"], 2);

    let (status, json) = post(&c.app, "/api/recorder/stop", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["records"].as_array().unwrap().len(), 2);
    assert!(json["write_error"].is_null());

    let file = c.dir.path().join(".pna/macros/pick.json");
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(file).unwrap()).unwrap();
    assert_eq!(saved["1"]["operationName"], "goto");
    assert_eq!(saved["1"]["params"]["x"], 1);
    assert_eq!(saved["2"]["id"], "2");

    let (status, json) = post(&c.app, "/api/macros/load", serde_json::json!({"path": "pick"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["imported"], 2);

    let (_, page) = get(&c.app, "/api/jobs").await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["jobs"][1]["operation"], "close");

    let (_, listed) = get(&c.app, "/api/macros").await;
    assert_eq!(listed, serde_json::json!(["pick"]));
}

#[tokio::test]
async fn replay_reports_where_it_stopped() {
    let c = cell();
    let path = c.dir.path().join(".pna/macros/seq.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"[
            {"machine": "gantry", "action": "goto", "params": {"x": 3}},
            {"machine": "gripper", "action": "close"},
            {"machine": "gripper", "action": "open"}
        ]"#,
    )
    .unwrap();

    let (status, json) = post(&c.app, "/api/macros/replay", serde_json::json!({"path": "seq"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["completed"], 1);
    assert_eq!(json["failed_at"][0], 2);
    assert_eq!(c.sim.call_keys(), vec!["rig.goto", "gripper.close"]);
}

#[tokio::test]
async fn missing_or_malformed_macro_files() {
    let c = cell();
    let (status, _) = post(&c.app, "/api/macros/load", serde_json::json!({"path": "nope"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let bad = c.dir.path().join(".pna/macros/bad.json");
    std::fs::create_dir_all(bad.parent().unwrap()).unwrap();
    std::fs::write(&bad, "42").unwrap();
    let (status, _) = post(&c.app, "/api/macros/load", serde_json::json!({"path": "bad"})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// Jobs + runner
// ---------------------------------------------------------------------------

#[tokio::test]
async fn job_crud() {
    let c = cell();
    let (status, job) = send(&c.app, "POST", "/api/jobs", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(job["status"], "to_do");
    assert!(job["device_class"].is_null());

    // Choosing an operation without params fills in its template.
    let (status, job) = send(
        &c.app,
        "PUT",
        "/api/jobs/1",
        Some(serde_json::json!({"device_class": "arm", "operation": "goto"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["params"]["j6"], 0);
    assert_eq!(job["params"]["speed"], 50);

    let (status, _) = get(&c.app, "/api/jobs/1").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&c.app, "DELETE", "/api/jobs/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = get(&c.app, "/api/jobs/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, job) = send(&c.app, "POST", "/api/jobs", None).await;
    assert_eq!(job["id"], 2);
}

#[tokio::test]
async fn list_jobs_filters_and_pages() {
    let c = cell();
    add_job(&c.app, "rig", "goto", serde_json::json!({})).await;
    add_job(&c.app, "gripper", "open", serde_json::json!({})).await;
    add_job(&c.app, "rig", "step", serde_json::json!({})).await;

    let (_, page) = get(&c.app, "/api/jobs?filter=rig&offset=1&limit=5").await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["jobs"].as_array().unwrap().len(), 1);
    assert_eq!(page["jobs"][0]["operation"], "step");
}

#[tokio::test]
async fn run_drains_queue_in_order() {
    let c = cell();
    add_job(&c.app, "rig", "goto", serde_json::json!({"x": 10, "y": 0})).await;
    add_job(&c.app, "gripper", "open", serde_json::json!({"time_s": 1})).await;

    let (status, json) = post(&c.app, "/api/runner/run", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["started"], true);

    let body = wait_for_stop(&c.app).await;
    assert_eq!(body["progress"]["completed"], 2);
    assert_eq!(body["progress"]["total"], 2);
    assert_eq!(body["ratio"], 1.0);
    assert_eq!(c.sim.call_keys(), vec!["rig.goto", "gripper.open"]);
}

#[tokio::test]
async fn step_then_reset() {
    let c = cell();
    add_job(&c.app, "gripper", "close", serde_json::json!({})).await;
    add_job(&c.app, "rig", "unlock", serde_json::json!({})).await;

    let (_, json) = post(&c.app, "/api/runner/step", serde_json::json!({})).await;
    assert_eq!(json["job"]["status"], "failed");
    assert!(json["job"]["error"].as_str().unwrap().contains("jammed"));
    assert_eq!(json["state"], "stopped");

    let (_, json) = post(&c.app, "/api/runner/step", serde_json::json!({})).await;
    assert_eq!(json["job"]["status"], "done");
    assert_eq!(json["progress"]["completed"], 1);

    let (_, json) = post(&c.app, "/api/runner/step", serde_json::json!({})).await;
    assert!(json["job"].is_null());

    let (_, json) = post(&c.app, "/api/runner/reset", serde_json::json!({})).await;
    assert_eq!(json["reset"], 2);
    assert_eq!(json["progress"]["completed"], 0);
}

#[tokio::test]
async fn reset_keeps_an_active_recording() {
    let c = cell();
    add_job(&c.app, "rig", "unlock", serde_json::json!({})).await;
    post(&c.app, "/api/recorder/start", serde_json::json!({"path": "keep"})).await;
    post(&c.app, "/api/dispatch/rig/goto", serde_json::json!({"x": 1})).await;
    post(&c.app, "/api/runner/step", serde_json::json!({})).await;

    let (status, _) = post(&c.app, "/api/runner/reset", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = get(&c.app, "/api/recorder").await;
    assert_eq!(json["status"]["state"], "recording");
    assert_eq!(json["status"]["recorded"], 2);

    let (_, json) = post(&c.app, "/api/recorder/stop", serde_json::json!({})).await;
    assert_eq!(json["records"].as_array().unwrap().len(), 2);
    assert!(c.dir.path().join(".pna/macros/keep.json").exists());
}

#[tokio::test]
async fn run_single_job_by_id() {
    let c = cell();
    add_job(&c.app, "rig", "goto", serde_json::json!({})).await;
    let id = add_job(&c.app, "screwdriver", "screwIn", serde_json::json!({"depth": 2})).await;

    let (status, job) = post(&c.app, &format!("/api/jobs/{id}/run"), serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "done");
    let mut keys = c.sim.call_keys();
    keys.sort();
    assert_eq!(keys, vec!["rig.step", "screwdriver.cw"]);

    let (status, _) = post(&c.app, "/api/jobs/99/run", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
