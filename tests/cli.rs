use std::error::Error;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn sealbox_command(store: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_sealbox"));
    command.env_remove("RUST_LOG").env("SEALBOX_STORE", store);
    command
}

fn run(store: &Path, args: &[&str]) -> Result<Output, Box<dyn Error>> {
    Ok(sealbox_command(store).args(args).output()?)
}

#[test]
fn version_flag_prints_build_information() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let output = run(&dir.path().join("unused.sbx"), &["--version"])?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.starts_with("sealbox "), "unexpected version line: {}", stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    assert!(!dir.path().join("unused.sbx").exists());
    Ok(())
}

#[test]
fn cli_end_to_end_flow() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let store = dir.path().join("vault.sbx");
    let input = dir.path().join("secret.txt");
    let recovered = dir.path().join("recovered.txt");
    fs::write(&input, b"Super secret payload for sealbox!")?;

    let put = run(&store, &["put", "secret", input.to_str().unwrap()])?;
    assert!(
        put.status.success(),
        "put command failed: {}",
        String::from_utf8_lossy(&put.stderr)
    );
    assert!(String::from_utf8(put.stdout)?.contains("Stored 33 bytes as secret"));
    assert!(store.exists());

    let ls = run(&store, &["ls"])?;
    let listing = String::from_utf8(ls.stdout)?;
    assert!(listing.contains("secret"));
    assert!(listing.contains("33"));

    let json = run(&store, &["ls", "--json"])?;
    let parsed: serde_json::Value = serde_json::from_slice(&json.stdout)?;
    assert_eq!(parsed[0]["name"], "secret");
    assert_eq!(parsed[0]["length"], 33);

    let get = run(&store, &["get", "secret", recovered.to_str().unwrap()])?;
    assert!(
        get.status.success(),
        "get command failed: {}",
        String::from_utf8_lossy(&get.stderr)
    );
    assert_eq!(fs::read(&recovered)?, fs::read(&input)?);

    let info = run(&store, &["info"])?;
    let info_stdout = String::from_utf8(info.stdout)?;
    assert!(info_stdout.contains("Count: 1"));
    assert!(info_stdout.contains("Payload: 33 B"));

    let key_a = run(&store, &["key"])?;
    let key_b = run(&store, &["key"])?;
    assert_eq!(key_a.stdout, key_b.stdout);
    assert_eq!(String::from_utf8(key_a.stdout)?.trim().len(), 64);

    let rm = run(&store, &["rm", "secret"])?;
    assert!(rm.status.success());
    assert!(String::from_utf8(rm.stdout)?.contains("Removed secret"));

    let ls_after = run(&store, &["ls"])?;
    assert_eq!(String::from_utf8(ls_after.stdout)?, "No entries\n");
    Ok(())
}

#[test]
fn missing_entry_is_an_error() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let store = dir.path().join("vault.sbx");
    let output = dir.path().join("out.bin");

    let get = run(&store, &["get", "ghost", output.to_str().unwrap()])?;
    assert!(!get.status.success());
    assert!(String::from_utf8(get.stderr)?.contains("Error: No entry named 'ghost'"));
    assert!(!output.exists());

    let rm = run(&store, &["rm", "ghost"])?;
    assert!(!rm.status.success());
    Ok(())
}

#[test]
fn store_flag_overrides_environment() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let env_store = dir.path().join("env.sbx");
    let flag_store = dir.path().join("flag.sbx");
    let input = dir.path().join("data.bin");
    fs::write(&input, b"payload")?;

    let put = run(
        &env_store,
        &["--store", flag_store.to_str().unwrap(), "put", "data", input.to_str().unwrap()],
    )?;
    assert!(put.status.success());
    assert!(flag_store.exists());
    assert!(!env_store.exists());
    Ok(())
}
