// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=DEPTH_ROI_VERSION");

    // Packagers may pin the version explicitly
    let version = if let Ok(v) = std::env::var("DEPTH_ROI_VERSION") {
        v
    } else {
        get_git_version()
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn get_git_version() -> String {
    let pkg_version = env!("CARGO_PKG_VERSION");

    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let described = described.strip_prefix('v').unwrap_or(&described);

            // "0.1.0" is an exact tag, a bare hash means no tag was found
            if described.contains('.') {
                described.to_string()
            } else {
                format!("{}-{}", pkg_version, described)
            }
        }
        _ => pkg_version.to_string(),
    }
}
