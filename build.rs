//! Build script for prqueue - embeds version information for `--version`.
//!
//! The resulting `BUILD_INFO_HUMAN` string is assembled from:
//!
//! 1. `CARGO_PKG_VERSION` from Cargo.toml.
//! 2. `git describe --tags --always --dirty` in parentheses, when the crate
//!    is built from a git checkout. `.cargo-ok` (left behind by
//!    `cargo install --git`) does not count as a local modification.
//! 3. The `rustc --version` line of the compiling toolchain.
//!
//! Example: `0.1.0 (v0.1.0-3-g1a2b3c4d-dirty) rustc 1.90.0 (1159e78c4 2025-09-14)`

use std::process::Command;

fn main() {
    for path in ["src", "build.rs", "Cargo.toml", "Cargo.lock"] {
        println!("cargo:rerun-if-changed={path}");
    }

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", build_info());
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn only_cargo_ok_modified() -> bool {
    run("git", &["status", "--porcelain"]).is_some_and(|status| {
        status
            .lines()
            .all(|line| line.get(3..) == Some(".cargo-ok"))
    })
}

fn git_describe() -> Option<String> {
    let desc = run("git", &["describe", "--tags", "--always", "--dirty"])?;
    match desc.strip_suffix("-dirty") {
        Some(clean) if only_cargo_ok_modified() => Some(clean.to_string()),
        _ => Some(desc),
    }
}

fn build_info() -> String {
    [
        Some(env!("CARGO_PKG_VERSION").to_string()),
        git_describe().map(|desc| format!("({desc})")),
        run("rustc", &["--version"]),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
}
