//! Target platform vocabulary: distributions, CPU architectures and releases.
//!
//! These are the closed sets a [`BuildContext`](crate::context::BuildContext)
//! is resolved into. Everything here parses from the lowercase strings users
//! write in recipes and on the command line.

pub mod arch;
pub mod distro;
pub mod version;

use std::fmt;

pub use arch::CpuArch;
pub use distro::{Distro, DistroSpec, PackageType};
pub use version::Version;

/// Errors raised when a platform name cannot be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
  #[error("unsupported distribution: {0}")]
  UnsupportedDistro(String),

  #[error("unknown CPU architecture: {0}")]
  UnknownCpuArch(String),

  #[error("unknown package type: {0} (expected 'deb' or 'rpm')")]
  UnknownPackageType(String),

  #[error("invalid version: {0}")]
  InvalidVersion(String),
}

/// Target platform of a stage (e.g., "x86_64-ubuntu22.04")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: CpuArch,
  pub distro: Distro,
  pub version: Version,
}

impl Platform {
  pub fn new(arch: CpuArch, distro: Distro, version: Version) -> Self {
    Self { arch, distro, version }
  }

  /// Returns the platform triple string (e.g., "aarch64-rockylinux9.0")
  pub fn triple(&self) -> String {
    format!("{}-{}{}", self.arch, self.distro, self.distro.version_label(self.version))
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}
