//! Fake toolchains for exercising the run pipeline without a JDK.

use crate::model::{RunConfig, ToolchainConfig};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Write an executable `/bin/sh` script named `name` into `dir`.
pub(crate) fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A config whose workspace and fake tools all live under `root`.
pub(crate) fn fake_config(root: &Path, javac: &str, java: &str, kotlinc: &str) -> RunConfig {
    let bin = root.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    RunConfig {
        workspace_dir: root.join("ide_temp_run"),
        toolchain: ToolchainConfig {
            javac: fake_tool(&bin, "javac", javac),
            java: fake_tool(&bin, "java", java),
            kotlinc: fake_tool(&bin, "kotlinc", kotlinc),
        },
        timeout: None,
    }
}
