use std::env;
use std::process::Command;

/// Short hash of the checked-out commit, if this is a git checkout.
fn commit_sha() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=10", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())?;
    let sha = String::from_utf8(output.stdout).ok()?;
    let sha = sha.trim();
    (!sha.is_empty()).then(|| sha.to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs/heads");
    println!("cargo:rerun-if-env-changed=LOTLEDGER_BUILD_SHA");

    // Release tarballs have no .git; packagers pass the sha in.
    let sha = env::var("LOTLEDGER_BUILD_SHA")
        .ok()
        .or_else(commit_sha)
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=LOTLEDGER_COMMIT={sha}");

    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=LOTLEDGER_TARGET={target}");
}
