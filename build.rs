use std::env;
use std::process::Command;

fn main() {
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    let profile = env::var("PROFILE").unwrap_or_else(|_| "debug".to_string());
    let profile_label = if profile == "release" {
        "release"
    } else {
        "development"
    };

    // Short commit hash, or "unknown" outside a git checkout
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=SEALBOX_VERSION={}", version);
    println!("cargo:rustc-env=SEALBOX_PROFILE={}", profile_label);
    println!("cargo:rustc-env=SEALBOX_GIT_HASH={}", git_hash);

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=PROFILE");
}
