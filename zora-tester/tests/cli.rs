use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "zora-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_zora-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("cloud-roundtrip"));
}

#[test]
fn cli_writes_json_report() {
    let exe = env!("CARGO_BIN_EXE_zora-tester");
    let output_path = temp_path("json");
    let status = Command::new(exe)
        .args([
            "--scenarios",
            "first-run,reset,tamper",
            "--seeds",
            "1,2",
            "--iterations",
            "1",
            "--report",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    let report: serde_json::Value = serde_json::from_str(&content).expect("json report");
    assert_eq!(report["total"], 6);
    assert_eq!(report["passed"], 6);
}

#[test]
fn cli_rejects_unknown_scenario() {
    let exe = env!("CARGO_BIN_EXE_zora-tester");
    let output = Command::new(exe)
        .args(["--scenarios", "smoke"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown scenario: smoke"));
}
