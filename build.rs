//! Build script for prbar: embeds a human-readable version string.
//!
//! The string is `<package version> (<git revision>) <rustc version>`.
//! The git revision comes from `git describe --tags --always --dirty`;
//! outside a checkout it falls back to the build date.

use std::{env, process::Command};

use chrono::Utc;

fn main() {
    for path in ["src", "build.rs", "Cargo.toml"] {
        println!("cargo:rerun-if-changed={path}");
    }
    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", build_info());
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn revision() -> String {
    command_output("git", &["describe", "--tags", "--always", "--dirty"])
        .unwrap_or_else(|| format!("built {}", Utc::now().format("%Y-%m-%d")))
}

fn build_info() -> String {
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let mut info = format!("{} ({})", env!("CARGO_PKG_VERSION"), revision());
    if let Some(version) = command_output(&rustc, &["--version"]) {
        info.push(' ');
        info.push_str(&version);
    }
    info
}
