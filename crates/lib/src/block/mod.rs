//! Building blocks: one installable piece of software each.
//!
//! A [`BuildingBlock`] turns its configuration plus the stage's
//! [`BuildContext`] into an ordered list of primitives. It may also describe a
//! second, smaller list for the runtime stage of a multi-stage build (usually
//! a copy of the installed prefix and the runtime libraries), evaluated
//! against the runtime stage's own context.
//!
//! Block configuration is plain serde structs with defaulted fields. Unknown
//! keys are rejected, so a misspelt option fails the recipe instead of being
//! silently ignored.

mod generic_autotools;
mod gnu;
mod nvhpc;
mod packages;

pub use generic_autotools::GenericAutotools;
pub use gnu::Gnu;
pub use nvhpc::Nvhpc;
pub use packages::Packages;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::BuildContext;
use crate::primitive::Primitive;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
  #[error("{block}: missing required parameter '{parameter}'")]
  MissingParameter { block: String, parameter: &'static str },

  #[error("{block}: the license agreement was not accepted (set eula = true)")]
  LicenseNotAccepted { block: String },

  #[error("{block}: {reason}")]
  Unsupported { block: String, reason: String },
}

/// What to do when a block's license agreement has not been accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicensePolicy {
  /// Refuse to generate the block.
  #[default]
  Fatal,
  /// Log a warning and generate the block anyway.
  Warn,
}

impl LicensePolicy {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Fatal => "fatal",
      Self::Warn => "warn",
    }
  }

  pub fn check(&self, block: &str, accepted: bool) -> Result<(), BlockError> {
    match (accepted, self) {
      (true, _) => Ok(()),
      (false, Self::Fatal) => Err(BlockError::LicenseNotAccepted {
        block: block.to_string(),
      }),
      (false, Self::Warn) => {
        warn!(block, "license agreement not accepted, generating the block anyway");
        Ok(())
      }
    }
  }
}

impl fmt::Display for LicensePolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for LicensePolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "fatal" => Ok(Self::Fatal),
      "warn" => Ok(Self::Warn),
      _ => Err(format!("unknown license policy: {s} (expected 'fatal' or 'warn')")),
    }
  }
}

pub trait BuildingBlock {
  /// Name used in errors and for excluding the block from a runtime projection.
  fn name(&self) -> &str;

  /// The primitives that install the block in a build stage.
  fn primitives(&self, ctx: &BuildContext) -> Result<Vec<Primitive>, BlockError>;

  /// The primitives that carry the block into a runtime stage built from `from`.
  fn runtime(&self, _ctx: &BuildContext, _from: &str) -> Result<Vec<Primitive>, BlockError> {
    Ok(Vec::new())
  }
}

/// Commands that download and unpack a source archive into the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tarball {
  pub fetch: Vec<String>,
  /// Directory the archive unpacks into.
  pub directory: String,
  pub cleanup: String,
}

const ARCHIVE_FLAGS: [(&str, &str); 7] = [
  (".tar.gz", "-z"),
  (".tgz", "-z"),
  (".tar.bz2", "-j"),
  (".tbz2", "-j"),
  (".tar.xz", "-J"),
  (".txz", "-J"),
  (".tar", ""),
];

pub(crate) fn fetch_tarball(
  ctx: &BuildContext,
  block: &str,
  url: &str,
  directory: Option<&str>,
) -> Result<Tarball, BlockError> {
  let wd = ctx.working_directory().trim_end_matches('/');
  let file = url.rsplit('/').next().unwrap_or(url);
  let (stem, flag) = ARCHIVE_FLAGS
    .iter()
    .find_map(|(ext, flag)| file.strip_suffix(ext).map(|stem| (stem, *flag)))
    .ok_or_else(|| BlockError::Unsupported {
      block: block.to_string(),
      reason: format!("unrecognised archive format: {file}"),
    })?;
  let directory = directory.unwrap_or(stem);

  let mut extract = format!("tar -x -f {wd}/{file} -C {wd}");
  if !flag.is_empty() {
    extract.push(' ');
    extract.push_str(flag);
  }

  Ok(Tarball {
    fetch: vec![
      format!("mkdir -p {wd} && wget -q -nc --no-check-certificate -P {wd} {url}"),
      format!("mkdir -p {wd} && {extract}"),
    ],
    directory: format!("{wd}/{directory}"),
    cleanup: format!("rm -rf {wd}/{directory} {wd}/{file}"),
  })
}

#[cfg(test)]
mod tests {
  use tracing_test::traced_test;

  use super::*;
  use crate::context::ContainerFormat;

  mod license {
    use super::*;

    #[test]
    fn fatal_policy_rejects() {
      assert_eq!(
        LicensePolicy::Fatal.check("nvhpc", false),
        Err(BlockError::LicenseNotAccepted {
          block: "nvhpc".to_string()
        })
      );
      assert_eq!(LicensePolicy::Fatal.check("nvhpc", true), Ok(()));
    }

    #[test]
    #[traced_test]
    fn warn_policy_continues() {
      assert_eq!(LicensePolicy::Warn.check("nvhpc", false), Ok(()));
      assert!(logs_contain("license agreement not accepted"));
    }

    #[test]
    fn parses_from_flags() {
      assert_eq!("WARN".parse::<LicensePolicy>(), Ok(LicensePolicy::Warn));
      assert!("ignore".parse::<LicensePolicy>().is_err());
    }
  }

  mod tarball {
    use super::*;

    fn ctx() -> BuildContext {
      BuildContext::new(ContainerFormat::Docker)
    }

    #[test]
    fn bzip2_archive() {
      let tarball = fetch_tarball(
        &ctx(),
        "openmpi",
        "https://download.open-mpi.org/release/open-mpi/v4.1/openmpi-4.1.6.tar.bz2",
        None,
      )
      .unwrap();
      assert_eq!(tarball.directory, "/var/tmp/openmpi-4.1.6");
      assert_eq!(
        tarball.fetch[1],
        "mkdir -p /var/tmp && tar -x -f /var/tmp/openmpi-4.1.6.tar.bz2 -C /var/tmp -j"
      );
      assert_eq!(tarball.cleanup, "rm -rf /var/tmp/openmpi-4.1.6 /var/tmp/openmpi-4.1.6.tar.bz2");
    }

    #[test]
    fn directory_override_and_working_directory() {
      let ctx = ctx().with_working_directory("/scratch/");
      let tarball = fetch_tarball(&ctx, "x", "https://example.com/v1.2.tgz", Some("x-1.2")).unwrap();
      assert_eq!(tarball.directory, "/scratch/x-1.2");
      assert!(tarball.fetch[0].ends_with("-P /scratch https://example.com/v1.2.tgz"));
    }

    #[test]
    fn unknown_archive_is_unsupported() {
      let err = fetch_tarball(&ctx(), "x", "https://example.com/x.zip", None).unwrap_err();
      assert!(matches!(err, BlockError::Unsupported { .. }));
    }
  }
}
