//! Records the compiler version for the `process.runtime.*` resource attributes.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let Ok(output) = Command::new(rustc).arg("--version").output() else {
        return;
    };
    if !output.status.success() {
        return;
    }

    let description = String::from_utf8_lossy(&output.stdout).trim().to_string();
    // "rustc 1.84.0 (9fc6b4312 2025-01-07)"
    if let Some(version) = description.split_whitespace().nth(1) {
        println!("cargo:rustc-env=OTELBOOT_RUSTC_VERSION={version}");
    }
    println!("cargo:rustc-env=OTELBOOT_RUSTC_DESCRIPTION={description}");
}
