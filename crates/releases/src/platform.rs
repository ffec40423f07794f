//! Platform detection for binary downloads.
//!
//! Only Linux targets are listed; this crate provisions Ubuntu hosts.

use crate::error::{Error, Result};
use crate::types::Platform;

/// Detect the current platform.
///
/// | Arch    | Triple                       |
/// |---------|------------------------------|
/// | x86_64  | x86_64-unknown-linux-gnu     |
/// | ARM64   | aarch64-unknown-linux-gnu    |
/// | RISC-V  | riscv64gc-unknown-linux-gnu  |
///
/// # Errors
///
/// Returns `Error::UnsupportedPlatform` on anything else.
pub fn detect() -> Result<Platform> {
    for_target(std::env::consts::OS, std::env::consts::ARCH)
}

/// Platform for an explicit OS/arch pair.
pub fn for_target(os: &str, arch: &str) -> Result<Platform> {
    let triple = match (os, arch) {
        ("linux", "x86_64") => "x86_64-unknown-linux-gnu",
        ("linux", "aarch64") => "aarch64-unknown-linux-gnu",
        ("linux", "riscv64") => "riscv64gc-unknown-linux-gnu",
        _ => {
            return Err(Error::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            });
        }
    };

    Ok(Platform::new(os, arch, triple))
}

/// Get the musl variant of a platform triple.
///
/// Some projects only publish statically linked musl builds.
#[must_use]
pub fn to_musl_triple(triple: &str) -> Option<&'static str> {
    match triple {
        "aarch64-unknown-linux-gnu" => Some("aarch64-unknown-linux-musl"),
        "x86_64-unknown-linux-gnu" => Some("x86_64-unknown-linux-musl"),
        _ => None,
    }
}
