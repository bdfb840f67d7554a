//! OS package installation.
//!
//! A [`PackageRequest`] names packages in a distribution-neutral way (plus
//! optional per-family overrides and repository setup). The backend chosen by
//! [`package_manager`] from the context's package type compiles it down to a
//! single shell primitive that installs the packages and cleans the package
//! cache afterwards.

mod apt;
mod yum;

pub use apt::Apt;
pub use yum::Yum;

use serde::{Deserialize, Serialize};

use crate::context::BuildContext;
use crate::platform::PackageType;
use crate::primitive::{Primitive, Shell};

/// Indentation of package names on continuation lines.
const PACKAGE_INDENT: &str = "        ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageRequest {
  /// Packages with the same name on every distribution.
  pub ospackages: Vec<String>,
  /// Debian package names, used instead of `ospackages` on deb systems.
  pub apt: Option<Vec<String>>,
  /// RPM package names, used instead of `ospackages` on rpm systems.
  pub yum: Option<Vec<String>>,
  pub apt_keys: Vec<String>,
  pub apt_ppas: Vec<String>,
  pub apt_repositories: Vec<String>,
  pub yum_keys: Vec<String>,
  pub yum_repositories: Vec<String>,
  pub epel: bool,
  pub powertools: bool,
  pub scl: bool,
  /// Use dnf-era tooling. Inferred from the distribution release when unset.
  pub yum4: Option<bool>,
}

impl PackageRequest {
  pub fn new<I, S>(packages: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      ospackages: packages.into_iter().map(Into::into).collect(),
      ..Self::default()
    }
  }

  /// Sorted, de-duplicated package names for one package family.
  pub fn packages_for(&self, package_type: PackageType) -> Vec<String> {
    let explicit = match package_type {
      PackageType::Deb => self.apt.as_ref(),
      PackageType::Rpm => self.yum.as_ref(),
    };
    let mut packages: Vec<String> = explicit
      .unwrap_or(&self.ospackages)
      .iter()
      .filter(|name| !name.trim().is_empty())
      .cloned()
      .collect();
    packages.sort();
    packages.dedup();
    packages
  }
}

pub trait PackageManager {
  /// Shell commands for the request; empty when there is nothing to do.
  fn commands(&self, ctx: &BuildContext, request: &PackageRequest) -> Vec<String>;

  /// The request as one shell primitive, or `None` when it installs nothing.
  fn install(&self, ctx: &BuildContext, request: &PackageRequest) -> Option<Primitive> {
    let commands = self.commands(ctx, request);
    if commands.is_empty() {
      None
    } else {
      Some(Shell::new(commands).into())
    }
  }
}

/// The backend for the context's package family.
pub fn package_manager(ctx: &BuildContext) -> &'static dyn PackageManager {
  match ctx.package_type() {
    PackageType::Deb => &Apt,
    PackageType::Rpm => &Yum,
  }
}

/// `<command> \` followed by one package per continuation line.
fn install_command(command: &str, packages: &[String]) -> String {
  let mut lines = vec![command.to_string()];
  lines.extend(packages.iter().map(|name| format!("{PACKAGE_INDENT}{name}")));
  lines.join(" \\\n")
}
