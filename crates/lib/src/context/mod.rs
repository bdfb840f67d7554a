//! Build context: everything a renderer or building block needs to know about
//! the target of a stage.
//!
//! A [`BuildContext`] is an immutable value. It starts from the recipe-wide
//! options (container format, Singularity version, working directory, license
//! policy) and is resolved per stage by [`BuildContext::with_base_image`],
//! which infers the distribution, release and CPU architecture from the
//! stage's base image. Every later primitive and building block of that stage
//! receives the resolved context by reference.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::block::LicensePolicy;
use crate::platform::{CpuArch, Distro, DistroSpec, PackageType, Platform, PlatformError, Version};
use crate::primitive::BaseImage;

/// Distribution assumed when a base image names none.
pub const FALLBACK_DISTRO: Distro = Distro::Ubuntu;

/// Working directory building blocks download and unpack sources into.
pub const DEFAULT_WORKING_DIRECTORY: &str = "/var/tmp";

/// Singularity release assumed unless the recipe says otherwise.
pub const DEFAULT_SINGULARITY_VERSION: Version = Version::new(3, 8);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
  #[error("unknown container type: {0} (expected docker, singularity or bash)")]
  UnknownContainerType(String),

  #[error(transparent)]
  Platform(#[from] PlatformError),
}

/// Output format of a rendered recipe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContainerFormat {
  #[default]
  Docker,
  Singularity,
  Bash,
}

impl ContainerFormat {
  pub const ALL: [ContainerFormat; 3] = [ContainerFormat::Docker, ContainerFormat::Singularity, ContainerFormat::Bash];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Docker => "docker",
      Self::Singularity => "singularity",
      Self::Bash => "bash",
    }
  }
}

impl fmt::Display for ContainerFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for ContainerFormat {
  type Err = ContextError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "docker" => Ok(Self::Docker),
      "singularity" | "apptainer" => Ok(Self::Singularity),
      "bash" => Ok(Self::Bash),
      _ => Err(ContextError::UnknownContainerType(s.to_string())),
    }
  }
}

impl TryFrom<String> for ContainerFormat {
  type Error = ContextError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<ContainerFormat> for String {
  fn from(format: ContainerFormat) -> Self {
    format.as_str().to_string()
  }
}

/// Resolved target of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
  container_format: ContainerFormat,
  distro: Distro,
  distro_version: Version,
  cpu_arch: CpuArch,
  package_type: PackageType,
  singularity_version: Version,
  working_directory: String,
  license_policy: LicensePolicy,
}

impl BuildContext {
  /// A context for `format` with every other setting at its default.
  pub fn new(container_format: ContainerFormat) -> Self {
    Self {
      container_format,
      distro: FALLBACK_DISTRO,
      distro_version: FALLBACK_DISTRO.default_version(),
      cpu_arch: CpuArch::default(),
      package_type: FALLBACK_DISTRO.package_type(),
      singularity_version: DEFAULT_SINGULARITY_VERSION,
      working_directory: DEFAULT_WORKING_DIRECTORY.to_string(),
      license_policy: LicensePolicy::default(),
    }
  }

  /// Resolve distribution, release, architecture and package type from a base image.
  ///
  /// Explicit overrides on the base image win over inference. An image that
  /// names no known distribution falls back to the default distribution with
  /// a warning; this never fails.
  pub fn with_base_image(mut self, base: &BaseImage) -> Self {
    let spec = match base.distro {
      Some(spec) => spec,
      None => match DistroSpec::infer(&base.image) {
        Some(spec) => spec,
        None => {
          warn!(
            image = %base.image,
            fallback = %FALLBACK_DISTRO,
            "unable to determine the Linux distribution of the base image, using the fallback"
          );
          DistroSpec {
            distro: FALLBACK_DISTRO,
            version: None,
          }
        }
      },
    };

    self.distro = spec.distro;
    self.distro_version = spec.version_or_default();
    self.package_type = spec.distro.package_type();
    self.cpu_arch = base
      .arch
      .or_else(|| CpuArch::from_image(&base.image))
      .unwrap_or_default();

    debug!(
      image = %base.image,
      platform = %self.platform(),
      package_type = %self.package_type,
      "resolved build context"
    );
    self
  }

  /// Force the package family, or re-derive it from the distribution when `None`.
  pub fn with_package_type(mut self, package_type: Option<PackageType>) -> Self {
    self.package_type = package_type.unwrap_or_else(|| self.distro.package_type());
    self
  }

  pub fn with_singularity_version(mut self, version: Version) -> Self {
    self.singularity_version = version;
    self
  }

  pub fn with_working_directory(mut self, directory: impl Into<String>) -> Self {
    self.working_directory = directory.into();
    self
  }

  pub fn with_license_policy(mut self, policy: LicensePolicy) -> Self {
    self.license_policy = policy;
    self
  }

  pub fn container_format(&self) -> ContainerFormat {
    self.container_format
  }

  pub fn distro(&self) -> Distro {
    self.distro
  }

  pub fn distro_version(&self) -> Version {
    self.distro_version
  }

  pub fn cpu_arch(&self) -> CpuArch {
    self.cpu_arch
  }

  pub fn package_type(&self) -> PackageType {
    self.package_type
  }

  pub fn singularity_version(&self) -> Version {
    self.singularity_version
  }

  pub fn working_directory(&self) -> &str {
    &self.working_directory
  }

  pub fn license_policy(&self) -> LicensePolicy {
    self.license_policy
  }

  pub fn platform(&self) -> Platform {
    Platform::new(self.cpu_arch, self.distro, self.distro_version)
  }

  /// Release label in the distribution's own notation (`22.04`, `8.0`).
  pub fn distro_version_label(&self) -> String {
    self.distro.version_label(self.distro_version)
  }
}

impl Default for BuildContext {
  fn default() -> Self {
    Self::new(ContainerFormat::default())
  }
}
