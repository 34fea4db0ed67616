use std::process::Command;

const VERSION_OVERRIDE_ENV: &str = "TICKET_DESK_VERSION";
const BUILD_VERSION_ENV: &str = "TICKET_DESK_BUILD_VERSION";

/// Strips a leading `v` from tag-style versions (`v1.2.0` -> `1.2.0`) and
/// returns `None` for blank input.
fn clean_version(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let cleaned = match trimmed.strip_prefix('v') {
        Some(rest) if rest.starts_with(|ch: char| ch.is_ascii_digit()) => rest,
        _ => trimmed,
    };
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

fn git_describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;
    clean_version(&String::from_utf8_lossy(&output.stdout))
}

fn main() {
    println!("cargo:rerun-if-env-changed={VERSION_OVERRIDE_ENV}");
    for git_file in [".git/HEAD", ".git/packed-refs"] {
        println!("cargo:rerun-if-changed={git_file}");
    }

    let version = std::env::var(VERSION_OVERRIDE_ENV)
        .ok()
        .as_deref()
        .and_then(clean_version)
        .or_else(git_describe)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env={BUILD_VERSION_ENV}={version}");
}
