use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlatformError;

/// CPU architecture of the container image being described
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CpuArch {
  #[default]
  X86_64,
  Aarch64,
  Ppc64le,
}

impl CpuArch {
  /// All supported architectures, in display order
  pub const ALL: [CpuArch; 3] = [CpuArch::X86_64, CpuArch::Aarch64, CpuArch::Ppc64le];

  /// Returns the lowercase string identifier for this architecture
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86_64 => "x86_64",
      Self::Aarch64 => "aarch64",
      Self::Ppc64le => "ppc64le",
    }
  }

  /// Infer the architecture from an image reference such as `arm64v8/ubuntu:22.04`.
  ///
  /// Returns `None` when the reference carries no architecture token.
  pub fn from_image(image: &str) -> Option<Self> {
    let image = image.to_ascii_lowercase();
    if image.contains("aarch64") || image.contains("arm64") {
      Some(Self::Aarch64)
    } else if image.contains("ppc64le") {
      Some(Self::Ppc64le)
    } else if image.contains("x86_64") || image.contains("amd64") {
      Some(Self::X86_64)
    } else {
      None
    }
  }
}

impl fmt::Display for CpuArch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for CpuArch {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "x86_64" | "amd64" | "x86-64" => Ok(Self::X86_64),
      "aarch64" | "arm64" => Ok(Self::Aarch64),
      "ppc64le" | "ppc64el" => Ok(Self::Ppc64le),
      _ => Err(PlatformError::UnknownCpuArch(s.to_string())),
    }
  }
}

impl TryFrom<String> for CpuArch {
  type Error = PlatformError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<CpuArch> for String {
  fn from(arch: CpuArch) -> Self {
    arch.as_str().to_string()
  }
}
