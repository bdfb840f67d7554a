use serde::{Deserialize, Serialize};

use super::{BlockError, BuildingBlock};
use crate::context::BuildContext;
use crate::packages::{PackageRequest, Yum, package_manager};
use crate::platform::{Distro, PackageType};
use crate::primitive::{Environment, Primitive, Shell};
use crate::toolchain::{Toolchain, ToolchainVar};

const TOOLCHAIN_PPA: &str = "ppa:ubuntu-toolchain-r/test";

/// The GNU compiler collection from the distribution's repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Gnu {
  pub cc: bool,
  pub cxx: bool,
  pub fortran: bool,
  /// Major version, e.g. "11". Installs the distribution default when unset.
  pub version: Option<String>,
  /// Use the Ubuntu toolchain PPA for versions the release does not ship.
  pub extra_repository: bool,
}

impl Default for Gnu {
  fn default() -> Self {
    Self {
      cc: true,
      cxx: true,
      fortran: true,
      version: None,
      extra_repository: false,
    }
  }
}

impl Gnu {
  /// Compiler commands with a working `update-alternatives` name, per language.
  fn compilers(&self) -> Vec<&'static str> {
    let mut compilers = Vec::new();
    if self.cxx {
      compilers.push("g++");
    }
    if self.cc {
      compilers.push("gcc");
    }
    if self.fortran {
      compilers.push("gfortran");
    }
    compilers
  }

  fn deb_packages(&self) -> Vec<String> {
    let suffix = self.version.as_ref().map(|v| format!("-{v}")).unwrap_or_default();
    self.compilers().iter().map(|c| format!("{c}{suffix}")).collect()
  }

  /// SCL prefix for a versioned RPM toolchain (`devtoolset-9` or `gcc-toolset-12`).
  fn rpm_toolset(&self, ctx: &BuildContext, version: &str) -> String {
    if ctx.distro_version().major >= 8 {
      format!("gcc-toolset-{version}")
    } else {
      format!("devtoolset-{version}")
    }
  }

  fn rpm_packages(&self, ctx: &BuildContext) -> Vec<String> {
    let mut names = Vec::new();
    if self.cc {
      names.push("gcc");
    }
    if self.cxx {
      names.push("gcc-c++");
    }
    if self.fortran {
      names.push("gcc-gfortran");
    }
    match &self.version {
      Some(version) => {
        let toolset = self.rpm_toolset(ctx, version);
        names.iter().map(|n| format!("{toolset}-{n}")).collect()
      }
      None => names.into_iter().map(String::from).collect(),
    }
  }

  /// The compilers this block puts on `PATH`.
  pub fn toolchain(&self) -> Toolchain {
    let mut toolchain = Toolchain::new();
    if self.cc {
      toolchain = toolchain.with(ToolchainVar::Cc, "gcc");
    }
    if self.cxx {
      toolchain = toolchain.with(ToolchainVar::Cxx, "g++");
    }
    if self.fortran {
      for var in [ToolchainVar::F77, ToolchainVar::F90, ToolchainVar::Fc] {
        toolchain = toolchain.with(var, "gfortran");
      }
    }
    toolchain
  }

  fn libgfortran(ctx: &BuildContext) -> &'static str {
    match ctx.distro_version().major {
      0..=16 => "libgfortran3",
      17..=18 => "libgfortran4",
      _ => "libgfortran5",
    }
  }
}

impl BuildingBlock for Gnu {
  fn name(&self) -> &str {
    "gnu"
  }

  fn primitives(&self, ctx: &BuildContext) -> Result<Vec<Primitive>, BlockError> {
    if !(self.cc || self.cxx || self.fortran) {
      return Err(BlockError::Unsupported {
        block: self.name().to_string(),
        reason: "at least one of cc, cxx and fortran must be enabled".to_string(),
      });
    }

    let mut primitives = Vec::new();
    match ctx.package_type() {
      PackageType::Deb => {
        let request = PackageRequest {
          ospackages: self.deb_packages(),
          apt_ppas: if self.extra_repository {
            vec![TOOLCHAIN_PPA.to_string()]
          } else {
            Vec::new()
          },
          ..PackageRequest::default()
        };
        primitives.extend(package_manager(ctx).install(ctx, &request));

        if let Some(version) = &self.version {
          let mut tools = self.compilers();
          if self.cc {
            tools.push("gcov");
          }
          tools.sort();
          let alternatives = tools
            .iter()
            .map(|tool| format!("update-alternatives --install /usr/bin/{tool} {tool} $(which {tool}-{version}) 30"));
          primitives.push(Shell::new(alternatives).into());
        }
      }
      PackageType::Rpm => {
        let legacy_scl = self.version.is_some() && !Yum::yum4(ctx, &PackageRequest::default());
        let request = PackageRequest {
          ospackages: self.rpm_packages(ctx),
          scl: legacy_scl && ctx.distro() == Distro::Centos,
          ..PackageRequest::default()
        };
        primitives.extend(package_manager(ctx).install(ctx, &request));

        if let Some(version) = &self.version {
          let root = format!("/opt/rh/{}/root/usr", self.rpm_toolset(ctx, version));
          primitives.push(
            Environment::new([
              ("PATH", format!("{root}/bin:$PATH")),
              ("LD_LIBRARY_PATH", format!("{root}/lib64:$LD_LIBRARY_PATH")),
            ])
            .into(),
          );
        }
      }
    }
    Ok(primitives)
  }

  fn runtime(&self, ctx: &BuildContext, _from: &str) -> Result<Vec<Primitive>, BlockError> {
    let mut request = PackageRequest::default();
    match ctx.package_type() {
      PackageType::Deb => {
        request.ospackages.push("libgomp1".to_string());
        if self.fortran {
          request.ospackages.push(Self::libgfortran(ctx).to_string());
        }
      }
      PackageType::Rpm => {
        request.ospackages.push("libgomp".to_string());
        if self.fortran {
          request.ospackages.push("libgfortran".to_string());
        }
      }
    }
    Ok(package_manager(ctx).install(ctx, &request).into_iter().collect())
  }
}
