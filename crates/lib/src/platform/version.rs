use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlatformError;

/// A `major.minor` version, as used for distribution releases and Singularity.
///
/// A patch component is accepted when parsing and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
  pub major: u32,
  pub minor: u32,
}

impl Version {
  pub const fn new(major: u32, minor: u32) -> Self {
    Self { major, minor }
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.major, self.minor)
  }
}

impl FromStr for Version {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || PlatformError::InvalidVersion(s.to_string());
    let mut parts = s.trim().split('.');

    let major = parts
      .next()
      .filter(|p| !p.is_empty())
      .ok_or_else(invalid)?
      .parse::<u32>()
      .map_err(|_| invalid())?;
    let minor = match parts.next() {
      Some(p) => p.parse::<u32>().map_err(|_| invalid())?,
      None => 0,
    };
    if let Some(patch) = parts.next() {
      patch.parse::<u32>().map_err(|_| invalid())?;
    }
    if parts.next().is_some() {
      return Err(invalid());
    }

    Ok(Self { major, minor })
  }
}

impl TryFrom<String> for Version {
  type Error = PlatformError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Version> for String {
  fn from(version: Version) -> Self {
    version.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_major_minor_and_patch() {
    assert_eq!("3.6".parse::<Version>().unwrap(), Version::new(3, 6));
    assert_eq!("3.8.4".parse::<Version>().unwrap(), Version::new(3, 8));
    assert_eq!("8".parse::<Version>().unwrap(), Version::new(8, 0));
    assert_eq!("16.04".parse::<Version>().unwrap(), Version::new(16, 4));
  }

  #[test]
  fn rejects_garbage() {
    assert!("".parse::<Version>().is_err());
    assert!("three".parse::<Version>().is_err());
    assert!("1.2.3.4".parse::<Version>().is_err());
  }

  #[test]
  fn orders_numerically() {
    assert!(Version::new(3, 10) > Version::new(3, 6));
    assert!(Version::new(8, 0) >= Version::new(8, 0));
  }
}
