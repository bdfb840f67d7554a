use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{PlatformError, Version};

/// Matches a distribution token optionally followed by a release, e.g.
/// `ubuntu16.04`, `ubuntu:22.04`, `centos7`, `ubi8`, `rockylinux-9`.
static DISTRO_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)(ubuntu|centos|rockylinux|almalinux|rhel|ubi)[:\-_]?(?:(\d+)(?:\.(\d+))?)?")
    .expect("distro token pattern is valid")
});

/// Linux distribution family of a base image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Distro {
  #[default]
  Ubuntu,
  Centos,
  Rhel,
  RockyLinux,
}

impl Distro {
  pub const ALL: [Distro; 4] = [Distro::Ubuntu, Distro::Centos, Distro::Rhel, Distro::RockyLinux];

  /// Returns the lowercase string identifier for this distribution
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Ubuntu => "ubuntu",
      Self::Centos => "centos",
      Self::Rhel => "rhel",
      Self::RockyLinux => "rockylinux",
    }
  }

  /// The package family this distribution installs from.
  pub fn package_type(&self) -> PackageType {
    match self {
      Self::Ubuntu => PackageType::Deb,
      Self::Centos | Self::Rhel | Self::RockyLinux => PackageType::Rpm,
    }
  }

  /// Release assumed when an image names the distribution without a version.
  pub fn default_version(&self) -> Version {
    match self {
      Self::Ubuntu => Version::new(22, 4),
      Self::Centos => Version::new(7, 0),
      Self::Rhel | Self::RockyLinux => Version::new(9, 0),
    }
  }

  /// Human form of a release of this distribution (`22.04`, `8.0`).
  pub fn version_label(&self, version: Version) -> String {
    match self {
      Self::Ubuntu => format!("{}.{:02}", version.major, version.minor),
      _ => version.to_string(),
    }
  }

  fn from_token(token: &str) -> Option<Self> {
    match token.to_ascii_lowercase().as_str() {
      "ubuntu" => Some(Self::Ubuntu),
      "centos" => Some(Self::Centos),
      "rockylinux" => Some(Self::RockyLinux),
      "rhel" | "ubi" | "almalinux" => Some(Self::Rhel),
      _ => None,
    }
  }

  fn version_from_captures(&self, major: Option<&str>, minor: Option<&str>) -> Option<Version> {
    let major = major?.parse::<u32>().ok()?;
    let minor = match minor {
      Some(m) => m.parse::<u32>().ok()?,
      // Ubuntu LTS releases are all .04
      None if *self == Self::Ubuntu => 4,
      None => 0,
    };
    Some(Version::new(major, minor))
  }
}

impl fmt::Display for Distro {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Distro {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::from_token(s).ok_or_else(|| PlatformError::UnsupportedDistro(s.to_string()))
  }
}

impl TryFrom<String> for Distro {
  type Error = PlatformError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Distro> for String {
  fn from(distro: Distro) -> Self {
    distro.as_str().to_string()
  }
}

/// Package-manager family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PackageType {
  #[default]
  Deb,
  Rpm,
}

impl PackageType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Deb => "deb",
      Self::Rpm => "rpm",
    }
  }
}

impl fmt::Display for PackageType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for PackageType {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "deb" => Ok(Self::Deb),
      "rpm" => Ok(Self::Rpm),
      _ => Err(PlatformError::UnknownPackageType(s.to_string())),
    }
  }
}

impl TryFrom<String> for PackageType {
  type Error = PlatformError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<PackageType> for String {
  fn from(package_type: PackageType) -> Self {
    package_type.as_str().to_string()
  }
}

/// A distribution with an optional release, as found in an image reference or
/// given as an explicit override (`ubuntu22`, `centos:7`, `rockylinux9`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DistroSpec {
  pub distro: Distro,
  pub version: Option<Version>,
}

impl DistroSpec {
  /// Search an image reference for a known distribution token.
  ///
  /// Returns `None` when no token is present; the caller decides the fallback.
  pub fn infer(image: &str) -> Option<Self> {
    let caps = DISTRO_TOKEN.captures(image)?;
    let distro = Distro::from_token(caps.get(1)?.as_str())?;
    let version = distro.version_from_captures(caps.get(2).map(|m| m.as_str()), caps.get(3).map(|m| m.as_str()));
    Some(Self { distro, version })
  }

  /// The release, or the distribution's default release when none was given.
  pub fn version_or_default(&self) -> Version {
    self.version.unwrap_or_else(|| self.distro.default_version())
  }
}

impl fmt::Display for DistroSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.version {
      Some(version) => write!(f, "{}{}", self.distro, self.distro.version_label(version)),
      None => write!(f, "{}", self.distro),
    }
  }
}

impl FromStr for DistroSpec {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let unsupported = || PlatformError::UnsupportedDistro(s.to_string());
    let caps = DISTRO_TOKEN.captures(s.trim()).ok_or_else(unsupported)?;
    // An explicit override must consist of the token alone.
    let whole = caps.get(0).ok_or_else(unsupported)?;
    if whole.as_str().len() != s.trim().len() {
      return Err(unsupported());
    }
    let distro = Distro::from_token(caps.get(1).ok_or_else(unsupported)?.as_str()).ok_or_else(unsupported)?;
    let version = distro.version_from_captures(caps.get(2).map(|m| m.as_str()), caps.get(3).map(|m| m.as_str()));
    Ok(Self { distro, version })
  }
}

impl TryFrom<String> for DistroSpec {
  type Error = PlatformError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<DistroSpec> for String {
  fn from(spec: DistroSpec) -> Self {
    spec.to_string()
  }
}
