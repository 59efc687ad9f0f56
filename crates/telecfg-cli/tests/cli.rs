//! 以真实子进程运行 `telecfg`，覆盖 `broker` 子命令作为二级进程的完整链路。

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

const VOLTE: &str = "carrier_volte_available_bool";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn image(&self) -> PathBuf {
        self.dir.path().join("device.json")
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("telecfg.toml")
    }

    fn telecfg(&self, args: &[&str]) -> Output {
        let image = self.image();
        let config = self.config();
        Command::new(env!("CARGO_BIN_EXE_telecfg"))
            .arg("--config")
            .arg(&config)
            .arg("--image")
            .arg(&image)
            .args(args)
            .env("RUST_LOG", "warn")
            .output()
            .unwrap()
    }

    fn init(&self, patch: &str) {
        let output = self.telecfg(&["device", "init", "--sdk", "34", "--patch", patch]);
        assert!(output.status.success(), "{}", stderr(&output));
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn json_line(output: &Output) -> Value {
    let text = stdout(output);
    let line = text.lines().last().unwrap_or_default();
    serde_json::from_str(line).unwrap()
}

fn overrides_in(image: &Path) -> Value {
    let raw = std::fs::read_to_string(image).unwrap();
    let image: Value = serde_json::from_str(&raw).unwrap();
    image["overrides"].clone()
}

#[test]
fn subs_lists_the_sample_subscriptions() {
    let ws = Workspace::new();
    ws.init("2024-01-01");

    let output = ws.telecfg(&["subs"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let ids: Vec<i64> = stdout(&output)
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap()["subscription_id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn set_after_policy_date_goes_through_the_broker_process() {
    let ws = Workspace::new();
    ws.init("2025-10-01");

    let output = ws.telecfg(&["set", "1", VOLTE, "bool:true"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let receipt = json_line(&output);
    assert_eq!(receipt["decision"], "delegated");
    assert_eq!(receipt["shape"], "persistent");

    let output = ws.telecfg(&["get", "1", VOLTE]);
    assert_eq!(stdout(&output).trim(), "bool:true");
    assert!(overrides_in(&ws.image()).get("2").is_none());
}

#[test]
fn set_before_policy_date_is_direct() {
    let ws = Workspace::new();
    ws.init("2024-01-01");

    let output = ws.telecfg(&["set", "2", "wfc_spn_format_idx_int", "int:3"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(json_line(&output)["decision"], "direct");

    let output = ws.telecfg(&["clear", "2"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let output = ws.telecfg(&["get", "2", "wfc_spn_format_idx_int"]);
    assert_eq!(stdout(&output).trim(), "int:0");
}

#[test]
fn malformed_value_is_rejected_before_any_launch() {
    let ws = Workspace::new();
    ws.init("2025-10-01");

    let output = ws.telecfg(&["set", "1", VOLTE, "truthy"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains(VOLTE));
}

#[test]
fn broker_without_arguments_is_a_silent_no_op() {
    let ws = Workspace::new();
    ws.init("2025-10-01");

    let output = ws.telecfg(&["broker"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).trim().is_empty());
}

#[test]
fn broker_reports_malformed_requests_as_a_typed_completion() {
    let ws = Workspace::new();
    ws.init("2025-10-01");

    let output = ws.telecfg(&["broker", "--", "-e", "telecfg.sub_id"]);
    assert_eq!(output.status.code(), Some(1));
    let completion = json_line(&output);
    assert_eq!(completion["status"], "failed");
    assert_eq!(completion["kind"], "malformed");
}

#[test]
fn toggle_flips_the_flag_and_restarts_ims() {
    let ws = Workspace::new();
    ws.init("2024-01-01");

    let output = ws.telecfg(&["toggle", "2", "volte"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "volte\ton");

    let raw = std::fs::read_to_string(ws.image()).unwrap();
    let image: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(image["ims_resets"], serde_json::json!([1]));
}

#[test]
fn negative_subscription_ids_reach_the_bridge() {
    let ws = Workspace::new();
    ws.init("2024-01-01");

    let output = ws.telecfg(&["flags", "-1"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(!text.is_empty());
    assert!(text.lines().all(|line| line.ends_with("\toff")), "{text}");

    let output = ws.telecfg(&["get", "-1", VOLTE]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("subscription -1"));
}

#[test]
fn ims_support_reads_the_device_resource() {
    let ws = Workspace::new();
    ws.init("2024-01-01");

    let output = ws.telecfg(&["ims-support"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "true");
}

#[test]
fn device_image_can_come_from_the_config_file() {
    let ws = Workspace::new();
    ws.init("2024-01-01");
    std::fs::write(
        ws.config(),
        format!("[device]\nimage = {:?}\n", ws.image().display().to_string()),
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_telecfg"))
        .arg("--config")
        .arg(ws.config())
        .arg("subs")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output).lines().count(), 2);
}

#[test]
fn missing_image_is_reported() {
    let ws = Workspace::new();
    let output = ws.telecfg(&["subs"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("device image"));
}
