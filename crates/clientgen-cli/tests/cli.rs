//! End-to-end tests for the clientgen binary

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::process::{Command, Output};

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../clientgen-core/tests/fixtures/widgets.ir.yaml")
}

fn clientgen(args: &[&str]) -> Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_clientgen"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .context("Failed to run clientgen")
}

fn succeed(args: &[&str]) -> Result<String> {
    let output = clientgen(args)?;
    if !output.status.success() {
        bail!(
            "clientgen {:?} failed:\n{}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8(output.stdout)?)
}

#[test]
fn test_generate_writes_crate() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let output_dir = dir.path().join("widgets");
    let ir = fixture().display().to_string();
    let stdout = succeed(&[
        "generate",
        "--ir",
        &ir,
        "--project-name",
        "widgets-client",
        "--output-dir",
        &output_dir.display().to_string(),
        "--no-tests",
    ])?;
    assert!(stdout.contains("Generated widgets-client"));

    let manifest = std::fs::read_to_string(output_dir.join("Cargo.toml"))?;
    assert!(manifest.contains("name = \"widgets-client\""));
    assert!(output_dir.join("src/client.rs").exists());
    assert!(output_dir.join("src/models/widget.rs").exists());
    assert!(!output_dir.join("tests/roundtrip.rs").exists());
    Ok(())
}

#[test]
fn test_license_header_heads_sources() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let header = dir.path().join("HEADER");
    std::fs::write(&header, "Copyright Widgets Inc.")?;
    let output_dir = dir.path().join("out");
    let ir = fixture().display().to_string();
    succeed(&[
        "generate",
        "--ir",
        &ir,
        "--output-dir",
        &output_dir.display().to_string(),
        "--license-header",
        &header.display().to_string(),
    ])?;

    let lib = std::fs::read_to_string(output_dir.join("src/lib.rs"))?;
    assert!(lib.starts_with("// Copyright Widgets Inc."));
    Ok(())
}

#[test]
fn test_check_summarizes() -> Result<()> {
    let ir = fixture().display().to_string();
    let stdout = succeed(&["check", "--ir", &ir])?;
    assert!(stdout.starts_with("Widgets (version 2024-06-01)"));
    assert!(stdout.contains("Widget (model) -> widget"));
    assert!(stdout.contains("widgets_create PUT"));

    let json = succeed(&["check", "--ir", &ir, "--api-version", "2024-01-01", "--json"])?;
    let summary: serde_json::Value = serde_json::from_str(&json)?;
    assert_eq!(summary["target_version"], "2024-01-01");
    let operations = summary["operations"].as_array().context("operations")?;
    assert!(operations.iter().all(|op| op["id"] != "Fish_Catch"));
    Ok(())
}

#[test]
fn test_bad_input_fails() -> Result<()> {
    let ir = fixture().display().to_string();

    let output = clientgen(&["check", "--ir", &ir, "--rename-model", "Widget"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("From:To"));

    let dir = tempfile::tempdir()?;
    let output = clientgen(&[
        "generate",
        "--ir",
        &ir,
        "--template-kind",
        "cobol_client",
        "--output-dir",
        &dir.path().join("out").display().to_string(),
    ])?;
    assert!(!output.status.success());

    let output = clientgen(&["check"])?;
    assert!(!output.status.success());
    Ok(())
}
