//! Bridge behaviour against real host processes found through manifests.
//!
//! The hosts are small shell scripts written into a temporary manifest
//! directory, so these tests only run on unix.

#![cfg(unix)]

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use native_host_bridge::{Bridge, ChannelState, Error};
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

const ORIGIN: &str = "chrome-extension://aiimcjfjmibedicmckpphgbddankgdln/";

/// Writes an executable host script and its manifest into `dir`.
fn install_host(dir: &Path, name: &str, script: &str) -> anyhow::Result<PathBuf> {
    let executable = dir.join(format!("{name}.sh"));
    fs::write(&executable, format!("#!/bin/sh\n{script}\n"))?;
    fs::set_permissions(&executable, fs::Permissions::from_mode(0o755))?;

    let manifest = json!({
        "name": name,
        "description": "test host",
        "path": executable,
        "type": "stdio",
        "allowed_origins": [ORIGIN],
    });
    let manifest_path = dir.join(format!("{name}.json"));
    fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)?;
    Ok(manifest_path)
}

/// Shell snippet that writes `frame` with its native-endian length prefix.
fn emit_frame(frame: &str) -> String {
    let prefix: String = (frame.len() as u32)
        .to_ne_bytes()
        .iter()
        .map(|b| format!("\\{b:03o}"))
        .collect();
    format!("printf '{prefix}%s' '{frame}'")
}

fn bridge_for(dir: &TempDir, name: &str) -> anyhow::Result<Bridge> {
    Ok(Bridge::builder()
        .host_name(name)
        .manifest_dir(dir.path())
        .origin(ORIGIN)
        .connect_timeout(Duration::from_secs(5))
        .build()?)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_broadcast_from_spawned_host() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let frame = r#"{"kind":"update_available","payload":{"version":"2.0.0"}}"#;
    install_host(
        dir.path(),
        "com.example.notifier",
        &format!("{}\nexec cat > /dev/null", emit_frame(frame)),
    )?;

    let bridge = bridge_for(&dir, "com.example.notifier")?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _updates = bridge.on_broadcast("update_available", move |payload| {
        let _ = tx.send(payload.clone());
    });

    bridge.connect().await?;
    assert_eq!(bridge.state(), ChannelState::Open);

    let payload = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await?
        .expect("broadcast");
    assert_eq!(payload, json!({ "version": "2.0.0" }));

    bridge.close();
    assert_eq!(bridge.state(), ChannelState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_exiting_host_fails_request() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    install_host(dir.path(), "com.example.quitter", "exit 0")?;

    let bridge = bridge_for(&dir, "com.example.quitter")?;
    let err = bridge.ping().await.unwrap_err();
    assert!(err.is_connection_error(), "got {err:?}");
    assert_eq!(bridge.pending_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_unregistered_host_is_connection_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let bridge = bridge_for(&dir, "com.example.absent")?;

    let err = bridge.ping().await.unwrap_err();
    assert!(matches!(err, Error::Connection { .. }), "got {err:?}");
    assert!(err.to_string().contains("com.example.absent"));
    assert_eq!(bridge.state(), ChannelState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_foreign_origin_is_refused() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    install_host(dir.path(), "com.example.strict", "exec cat > /dev/null")?;

    let bridge = Bridge::builder()
        .host_name("com.example.strict")
        .manifest_dir(dir.path())
        .origin("chrome-extension://someoneelse/")
        .build()?;

    let err = bridge.connect().await.unwrap_err();
    assert!(err.to_string().contains("not allowed"), "got {err}");
    Ok(())
}

#[tokio::test]
async fn test_explicit_manifest_path() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let frame = r#"{"kind":"ready","payload":null}"#;
    let manifest = install_host(
        dir.path(),
        "com.example.direct",
        &format!("{}\nexec cat > /dev/null", emit_frame(frame)),
    )?;

    let bridge = Bridge::builder().manifest(manifest).build()?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _ready = bridge.on_broadcast("ready", move |_| {
        let _ = tx.send(());
    });

    bridge.connect().await?;
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await?
        .expect("ready broadcast");
    bridge.close();
    Ok(())
}
