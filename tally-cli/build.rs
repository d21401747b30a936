use std::path::Path;
use std::process::Command;

/// Stamp `tally --version` with the checkout it was built from.
/// Packagers building outside git can set TALLY_BUILD_SHA themselves.
fn main() {
    println!("cargo:rerun-if-env-changed=TALLY_BUILD_SHA");

    let sha = std::env::var("TALLY_BUILD_SHA")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(git_describe)
        .unwrap_or_else(|| "unknown".to_string());

    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let head = Path::new(&manifest_dir).join("..").join(".git").join("HEAD");
    if head.exists() {
        println!("cargo:rerun-if-changed={}", head.display());
    }

    println!("cargo:rustc-env=TALLY_BUILD_SHA={}", sha.trim());
}

fn git_describe() -> Option<String> {
    let out = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!s.is_empty()).then_some(s)
}
