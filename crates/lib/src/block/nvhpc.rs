use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BlockError, BuildingBlock, fetch_tarball};
use crate::context::BuildContext;
use crate::packages::{PackageRequest, package_manager};
use crate::platform::PackageType;
use crate::primitive::{Copy, Environment, Primitive, Shell};
use crate::toolchain::{Toolchain, ToolchainVar};

const BLOCK: &str = "nvhpc";
const DOWNLOAD_URL: &str = "https://developer.download.nvidia.com/hpc-sdk";

/// The NVIDIA HPC SDK (nvc, nvc++, nvfortran, bundled CUDA and MPI).
///
/// Installing it requires accepting the NVIDIA end-user license agreement
/// with `eula = true`; what happens otherwise is the recipe's license policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Nvhpc {
  pub eula: bool,
  /// SDK release as `YY.M`, e.g. "24.1".
  pub version: String,
  /// Install the package bundling every supported CUDA release.
  pub cuda_multi: bool,
  /// Bundled CUDA release when `cuda_multi` is off, e.g. "12.3".
  pub cuda: Option<String>,
  pub prefix: String,
  /// Set up `PATH`, `LD_LIBRARY_PATH` and `MANPATH` for the compilers.
  pub environment: bool,
  /// Also expose the bundled CUDA and math libraries.
  pub extended_environment: bool,
  /// Put the bundled MPI on the paths.
  pub mpi: bool,
  /// Download location override for air-gapped mirrors.
  pub url: Option<String>,
}

impl Default for Nvhpc {
  fn default() -> Self {
    Self {
      eula: false,
      version: "24.1".to_string(),
      cuda_multi: true,
      cuda: None,
      prefix: "/opt/nvidia/hpc_sdk".to_string(),
      environment: true,
      extended_environment: false,
      mpi: false,
      url: None,
    }
  }
}

impl Nvhpc {
  fn unsupported(&self, reason: impl Into<String>) -> BlockError {
    BlockError::Unsupported {
      block: BLOCK.to_string(),
      reason: reason.into(),
    }
  }

  /// `("2024", "241")` for version 24.1.
  fn release_parts(&self) -> Result<(String, String), BlockError> {
    let invalid = || self.unsupported(format!("version must look like YY.M, got '{}'", self.version));
    let (year, month) = self.version.split_once('.').ok_or_else(invalid)?;
    if year.len() != 2 || month.is_empty() || !format!("{year}{month}").chars().all(|c| c.is_ascii_digit()) {
      return Err(invalid());
    }
    Ok((format!("20{year}"), format!("{year}{month}")))
  }

  fn tarball_url(&self, ctx: &BuildContext) -> Result<String, BlockError> {
    if let Some(url) = &self.url {
      return Ok(url.clone());
    }
    let (year, nodot) = self.release_parts()?;
    let arch = ctx.cpu_arch();
    let flavour = if self.cuda_multi {
      "cuda_multi".to_string()
    } else {
      let cuda = self.cuda.as_ref().ok_or(BlockError::MissingParameter {
        block: BLOCK.to_string(),
        parameter: "cuda",
      })?;
      format!("cuda_{cuda}")
    };
    Ok(format!(
      "{DOWNLOAD_URL}/{}/nvhpc_{year}_{nodot}_Linux_{arch}_{flavour}.tar.gz",
      self.version
    ))
  }

  /// `<prefix>/Linux_<arch>/<version>`
  fn release_root(&self, ctx: &BuildContext) -> String {
    format!("{}/Linux_{}/{}", self.prefix.trim_end_matches('/'), ctx.cpu_arch(), self.version)
  }

  fn build_packages(ctx: &BuildContext) -> Vec<&'static str> {
    match ctx.package_type() {
      PackageType::Deb => vec![
        "bc",
        "debianutils",
        "g++",
        "gcc",
        "gfortran",
        "libatomic1",
        "libnuma1",
        "openssh-client",
        "wget",
      ],
      PackageType::Rpm => vec![
        "bc",
        "gcc",
        "gcc-c++",
        "gcc-gfortran",
        "libatomic",
        "numactl-libs",
        "openssh-clients",
        "wget",
        "which",
      ],
    }
  }

  fn runtime_packages(ctx: &BuildContext) -> Vec<&'static str> {
    match ctx.package_type() {
      PackageType::Deb => vec!["libatomic1", "libnuma1", "openssh-client"],
      PackageType::Rpm => vec!["libatomic", "numactl-libs", "openssh-clients"],
    }
  }

  fn environment(&self, ctx: &BuildContext) -> Option<Primitive> {
    if !self.environment {
      return None;
    }
    let root = self.release_root(ctx);
    let mut path = vec![format!("{root}/compilers/bin")];
    let mut ld_library_path = vec![format!("{root}/compilers/lib")];
    if self.mpi {
      path.push(format!("{root}/comm_libs/mpi/bin"));
      ld_library_path.push(format!("{root}/comm_libs/mpi/lib"));
    }
    if self.extended_environment {
      path.push(format!("{root}/cuda/bin"));
      ld_library_path.push(format!("{root}/cuda/lib64"));
      ld_library_path.push(format!("{root}/math_libs/lib64"));
    }
    path.push("$PATH".to_string());
    ld_library_path.push("$LD_LIBRARY_PATH".to_string());

    let mut variables = vec![
      ("PATH".to_string(), path.join(":")),
      ("LD_LIBRARY_PATH".to_string(), ld_library_path.join(":")),
      ("MANPATH".to_string(), format!("{root}/compilers/man:$MANPATH")),
    ];
    if self.extended_environment {
      variables.push(("CUDA_HOME".to_string(), format!("{root}/cuda")));
      variables.push(("CPATH".to_string(), format!("{root}/math_libs/include:$CPATH")));
    }
    Some(Environment::new(variables).into())
  }

  /// The SDK compilers, with `CUDA_HOME` pointing at the bundled CUDA.
  pub fn toolchain(&self, ctx: &BuildContext) -> Toolchain {
    Toolchain::new()
      .with(ToolchainVar::Cc, "nvc")
      .with(ToolchainVar::Cxx, "nvc++")
      .with(ToolchainVar::F77, "nvfortran")
      .with(ToolchainVar::F90, "nvfortran")
      .with(ToolchainVar::Fc, "nvfortran")
      .with(ToolchainVar::CudaHome, format!("{}/cuda", self.release_root(ctx)))
  }
}

impl BuildingBlock for Nvhpc {
  fn name(&self) -> &str {
    BLOCK
  }

  fn primitives(&self, ctx: &BuildContext) -> Result<Vec<Primitive>, BlockError> {
    ctx.license_policy().check(BLOCK, self.eula)?;

    let url = self.tarball_url(ctx)?;
    debug!(url = %url, arch = %ctx.cpu_arch(), "resolved NVIDIA HPC SDK tarball");
    let tarball = fetch_tarball(ctx, BLOCK, &url, None)?;

    let mut primitives = Vec::new();
    primitives.extend(package_manager(ctx).install(ctx, &PackageRequest::new(Self::build_packages(ctx))));

    let mut commands = tarball.fetch;
    commands.push(format!(
      "cd {} && NVHPC_SILENT=true NVHPC_INSTALL_DIR={} NVHPC_INSTALL_TYPE=single ./install",
      tarball.directory, self.prefix
    ));
    commands.push(tarball.cleanup);
    primitives.push(Shell::new(commands).into());

    primitives.extend(self.environment(ctx));
    Ok(primitives)
  }

  fn runtime(&self, ctx: &BuildContext, from: &str) -> Result<Vec<Primitive>, BlockError> {
    let root = self.release_root(ctx);
    let mut primitives = Vec::new();
    primitives.extend(package_manager(ctx).install(ctx, &PackageRequest::new(Self::runtime_packages(ctx))));
    primitives.push(
      Copy::new(format!("{root}/REDIST/compilers/lib/*"), format!("{root}/compilers/lib/"))
        .with_from(from)
        .into(),
    );
    primitives.push(Environment::new([("LD_LIBRARY_PATH", format!("{root}/compilers/lib:$LD_LIBRARY_PATH"))]).into());
    Ok(primitives)
  }
}

#[cfg(test)]
mod tests {
  use tracing_test::traced_test;

  use super::*;
  use crate::block::LicensePolicy;
  use crate::context::ContainerFormat;
  use crate::platform::CpuArch;
  use crate::primitive::BaseImage;

  fn ctx(image: &str) -> BuildContext {
    BuildContext::new(ContainerFormat::Docker).with_base_image(&BaseImage::new(image))
  }

  fn accepted() -> Nvhpc {
    Nvhpc {
      eula: true,
      ..Nvhpc::default()
    }
  }

  mod license {
    use super::*;

    #[test]
    fn rejected_eula_is_fatal_by_default() {
      let err = Nvhpc::default().primitives(&ctx("ubuntu:22.04")).unwrap_err();
      assert_eq!(err, BlockError::LicenseNotAccepted { block: "nvhpc".into() });
    }

    #[test]
    #[traced_test]
    fn warn_policy_generates_anyway() {
      let ctx = ctx("ubuntu:22.04").with_license_policy(LicensePolicy::Warn);
      assert!(!Nvhpc::default().primitives(&ctx).unwrap().is_empty());
      assert!(logs_contain("license agreement not accepted"));
    }
  }

  mod tarball {
    use super::*;

    #[test]
    fn name_follows_arch() {
      let x86 = ctx("ubuntu:22.04");
      assert_eq!(
        accepted().tarball_url(&x86).unwrap(),
        "https://developer.download.nvidia.com/hpc-sdk/24.1/nvhpc_2024_241_Linux_x86_64_cuda_multi.tar.gz"
      );

      let arm = BuildContext::new(ContainerFormat::Docker)
        .with_base_image(&BaseImage::new("ubuntu:22.04").with_arch(CpuArch::Aarch64));
      assert!(accepted().tarball_url(&arm).unwrap().ends_with("Linux_aarch64_cuda_multi.tar.gz"));
    }

    #[test]
    fn single_cuda_needs_a_release() {
      let nvhpc = Nvhpc {
        cuda_multi: false,
        ..accepted()
      };
      assert!(matches!(
        nvhpc.tarball_url(&ctx("ubuntu:22.04")),
        Err(BlockError::MissingParameter { parameter: "cuda", .. })
      ));

      let nvhpc = Nvhpc {
        cuda: Some("12.3".into()),
        ..nvhpc
      };
      assert!(nvhpc.tarball_url(&ctx("ubuntu:22.04")).unwrap().ends_with("_cuda_12.3.tar.gz"));
    }

    #[test]
    fn malformed_version() {
      let nvhpc = Nvhpc {
        version: "2024".into(),
        ..accepted()
      };
      assert!(matches!(nvhpc.tarball_url(&ctx("ubuntu:22.04")), Err(BlockError::Unsupported { .. })));
    }
  }

  #[test]
  fn installs_silently_with_environment() {
    let ctx = ctx("rockylinux:9");
    let rendered: Vec<String> = accepted()
      .primitives(&ctx)
      .unwrap()
      .iter()
      .map(|p| p.render(&ctx).unwrap())
      .collect();
    assert_eq!(rendered.len(), 3);
    assert!(rendered[0].contains("numactl-libs"));
    assert!(rendered[1].contains(
      "cd /var/tmp/nvhpc_2024_241_Linux_x86_64_cuda_multi && NVHPC_SILENT=true NVHPC_INSTALL_DIR=/opt/nvidia/hpc_sdk NVHPC_INSTALL_TYPE=single ./install"
    ));
    assert!(rendered[2].contains("PATH=/opt/nvidia/hpc_sdk/Linux_x86_64/24.1/compilers/bin:$PATH"));
  }

  #[test]
  fn runtime_copies_redistributable_libraries() {
    let ctx = ctx("ubuntu:22.04");
    let runtime = accepted().runtime(&ctx, "devel").unwrap();
    assert_eq!(
      runtime[1].render(&ctx).unwrap(),
      "COPY --from=devel /opt/nvidia/hpc_sdk/Linux_x86_64/24.1/REDIST/compilers/lib/* /opt/nvidia/hpc_sdk/Linux_x86_64/24.1/compilers/lib/"
    );
  }

  #[test]
  fn toolchain_points_at_sdk_compilers() {
    let toolchain = accepted().toolchain(&ctx("ubuntu:22.04"));
    assert_eq!(toolchain.get(ToolchainVar::Cxx), Some("nvc++"));
    assert_eq!(
      toolchain.get(ToolchainVar::CudaHome),
      Some("/opt/nvidia/hpc_sdk/Linux_x86_64/24.1/cuda")
    );
  }
}
