//! Implementation of the `stagefile info` command.

use anyhow::Result;
use serde_json::json;

use stagefile_lib::context::{ContainerFormat, DEFAULT_SINGULARITY_VERSION};
use stagefile_lib::platform::{CpuArch, Distro};

use crate::output::{print_json, print_stat};

pub fn cmd_info(json: bool) -> Result<()> {
  if json {
    let distros: Vec<_> = Distro::ALL
      .iter()
      .map(|d| {
        json!({
          "name": d.as_str(),
          "default_version": d.version_label(d.default_version()),
          "package_type": d.package_type().as_str(),
        })
      })
      .collect();
    return print_json(&json!({
      "version": env!("CARGO_PKG_VERSION"),
      "formats": ContainerFormat::ALL.iter().map(|f| f.as_str()).collect::<Vec<_>>(),
      "distros": distros,
      "architectures": CpuArch::ALL.iter().map(|a| a.as_str()).collect::<Vec<_>>(),
      "singularity_version": DEFAULT_SINGULARITY_VERSION.to_string(),
    }));
  }

  println!("stagefile {}", env!("CARGO_PKG_VERSION"));
  let formats: Vec<_> = ContainerFormat::ALL.iter().map(|f| f.as_str()).collect();
  print_stat("Formats", &formats.join(", "));
  let archs: Vec<_> = CpuArch::ALL.iter().map(|a| a.as_str()).collect();
  print_stat("Architectures", &archs.join(", "));
  print_stat("Singularity", &format!("{DEFAULT_SINGULARITY_VERSION} (default target)"));
  println!("Distributions:");
  for distro in Distro::ALL {
    println!(
      "  {:<12} {:<6} {} (default)",
      distro.as_str(),
      distro.package_type().as_str(),
      distro.version_label(distro.default_version())
    );
  }
  Ok(())
}
