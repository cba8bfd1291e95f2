use std::process::Command;

fn current_git_hash() -> Option<String> {
    if let Some(commit) = option_env!("GIT_COMMIT") {
        return Some(commit.to_string());
    }
    let output = Command::new("git")
        .arg("log")
        .arg("-1")
        .arg("--pretty=format:%h")
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .output()
        .ok()?;
    String::from_utf8(output.stdout)
        .ok()
        .filter(|commit| !commit.is_empty())
}

fn main() {
    let commit = current_git_hash().unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=GIT_COMMIT={}", commit);
}
