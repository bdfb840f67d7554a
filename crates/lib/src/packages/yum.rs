use tracing::warn;

use super::{PackageManager, PackageRequest, install_command};
use crate::context::BuildContext;
use crate::platform::PackageType;

/// CentOS, RHEL and Rocky Linux.
pub struct Yum;

impl Yum {
  /// Whether the target ships dnf-based tooling.
  pub fn yum4(ctx: &BuildContext, request: &PackageRequest) -> bool {
    request.yum4.unwrap_or(ctx.distro_version().major >= 8)
  }
}

impl PackageManager for Yum {
  fn commands(&self, ctx: &BuildContext, request: &PackageRequest) -> Vec<String> {
    let packages = request.packages_for(PackageType::Rpm);
    let yum4 = Self::yum4(ctx, request);
    let mut commands = Vec::new();

    commands.extend(request.yum_keys.iter().map(|key| format!("rpm --import {key}")));

    if !request.yum_repositories.is_empty() {
      let utils = if yum4 { "dnf-utils" } else { "yum-utils" };
      commands.push(format!("yum install -y {utils}"));
      commands.extend(
        request
          .yum_repositories
          .iter()
          .map(|repo| format!("yum-config-manager --add-repo {repo}")),
      );
    }

    if request.epel {
      commands.push("yum install -y epel-release".to_string());
    }

    if request.powertools {
      if yum4 {
        // Renamed to CRB in the 9 series.
        let repo = if ctx.distro_version().major >= 9 { "crb" } else { "powertools" };
        commands.push(format!(
          "yum install -y dnf-plugins-core && yum config-manager --set-enabled {repo}"
        ));
      } else {
        warn!(version = %ctx.distro_version(), "the PowerTools repository needs a yum4 distribution, skipping");
      }
    }

    if request.scl {
      commands.push("yum install -y centos-release-scl".to_string());
    }

    if packages.is_empty() && commands.is_empty() {
      return commands;
    }
    if !packages.is_empty() {
      commands.push(install_command("yum install -y", &packages));
    }
    commands.push("rm -rf /var/cache/yum/*".to_string());
    commands
  }
}
