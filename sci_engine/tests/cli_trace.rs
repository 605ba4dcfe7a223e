use std::fs;
use std::process::Command;

use anyhow::{Context, Result};
use serde_json::Value;
use tempfile::tempdir;

const TRACE: &str = r#"{
    "calls": [
        { "kernel": "NewList" },
        { "kernel": "NewNode", "args": ["7"] },
        { "kernel": "AddToFront", "args": ["0001:0000", "0002:0000"] },
        { "kernel": "EmptyList", "args": ["0001:0000"] },
        { "kernel": "Abs", "args": ["0001:0000"],
          "origin": { "game": "hoyle1", "room": 2, "script": 2, "object": "room2", "method": "doit" } },
        { "kernel": "Sqrt", "args": [] },
        { "kernel": "DoSound", "args": ["3"] }
    ]
}"#;

fn sci_engine() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sci_engine"))
}

#[test]
fn trace_report_and_manifest_are_written() -> Result<()> {
    let dir = tempdir()?;
    let trace_path = dir.path().join("trace.json");
    let report_path = dir.path().join("report.json");
    let kernel_path = dir.path().join("kernel.json");
    fs::write(&trace_path, TRACE)?;

    let output = sci_engine()
        .args(["--sci-version", "sci1-late", "--game", "hoyle1", "--strict"])
        .arg("--run-trace")
        .arg(&trace_path)
        .arg("--report-json")
        .arg(&report_path)
        .arg("--kernel-json")
        .arg(&kernel_path)
        .output()
        .context("running sci_engine")?;
    assert!(
        output.status.success(),
        "sci_engine failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_str(&fs::read_to_string(&report_path)?)?;
    let calls = report["calls"].as_array().context("calls array")?;
    assert_eq!(calls.len(), 7);
    assert_eq!(calls[3]["accumulator"], "0000:0000");
    assert_eq!(calls[4]["outcome"]["value"], "0000:03e9");
    assert_eq!(calls[5]["outcome"]["kind"], "error");
    assert_eq!(calls[6]["kernel"], "DoSound");
    assert_eq!(calls[6]["accumulator"], "0000:0009");
    assert_eq!(report["errors"], 1);

    let manifest: Value = serde_json::from_str(&fs::read_to_string(&kernel_path)?)?;
    let abs = &manifest["functions"][0x3d];
    assert_eq!(abs["name"], "Abs");
    assert_eq!(abs["status"], "native");
    assert_eq!(abs["signature"], "i");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Trace (7 calls, 1 errors)"));
    Ok(())
}

#[test]
fn missing_signature_policy_is_rejected() -> Result<()> {
    let output = sci_engine()
        .args(["--sci-version", "sci1-late"])
        .output()
        .context("running sci_engine")?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("signature policy"));
    Ok(())
}

#[test]
fn config_file_selects_version_and_policy() -> Result<()> {
    let dir = tempdir()?;
    let config_path = dir.path().join("engine.json");
    let names_path = dir.path().join("names.json");
    fs::write(
        &config_path,
        r#"{ "game": "sq3", "version": "sci0_late", "signature_policy": "permissive" }"#,
    )?;

    let output = sci_engine()
        .arg("--config")
        .arg(&config_path)
        .arg("--selectors-json")
        .arg(&names_path)
        .output()
        .context("running sci_engine")?;
    assert!(output.status.success());

    let names: Value = serde_json::from_str(&fs::read_to_string(&names_path)?)?;
    assert_eq!(names["version"], "sci0_late");
    assert_eq!(names["kernel_names"][0x41], "Abs");
    assert_eq!(names["selector_source"]["source"], "static");
    assert_eq!(names["selectors"]["y"], 3);
    assert_eq!(names["selectors"]["loop"], 6);
    Ok(())
}
