// Enochian Cyphers Build Script
// Generates build metadata and checks the on-disk sacred layout when present

use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=lighthouse/traditions/");

    generate_build_metadata();
    validate_sacred_layout();
}

fn generate_build_metadata() {
    let build_time = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let git_hash = get_git_hash().unwrap_or_else(|| "unknown".to_string());
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.2.0".to_string());

    let metadata = format!(
        r#"
// Auto-generated build metadata
pub const BUILD_TIME: &str = "{}";
pub const GIT_HASH: &str = "{}";
pub const VERSION: &str = "{}";
pub const SACRED_ARCHITECTURE_VERSION: &str = "6-layer-v1.0";
"#,
        build_time, git_hash, version
    );

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("build_metadata.rs");
    fs::write(&dest_path, metadata).expect("Failed to write build metadata");
}

// The tradition files are optional at build time (tests construct fixtures),
// but when the directory exists the 26-tradition partition must be complete.
fn validate_sacred_layout() {
    if let Ok(traditions_dir) = fs::read_dir("lighthouse/traditions") {
        let tradition_count = traditions_dir
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "json").unwrap_or(false))
            .count();
        if tradition_count != 26 {
            panic!(
                "Sacred constraint violation: expected 26 tradition files, found {}",
                tradition_count
            );
        }
    }
}

fn get_git_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
