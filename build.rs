// Embed git hash for --version. Optional; no git = no hash.
fn main() {
    let version = env!("CARGO_PKG_VERSION");
    let long_version = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|hash| format!("{version} ({})", hash.trim()))
        .unwrap_or_else(|| version.to_owned());
    println!("cargo:rustc-env=LINECAM_LONG_VERSION={long_version}");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
