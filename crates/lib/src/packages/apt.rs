use super::{PackageManager, PackageRequest, install_command};
use crate::context::BuildContext;
use crate::platform::PackageType;

/// Repository list written by the generated commands.
pub const SOURCES_LIST: &str = "/etc/apt/sources.list.d/stagefile.list";

const KEY_TOOLS: [&str; 4] = ["apt-transport-https", "ca-certificates", "gnupg", "wget"];

/// Debian and Ubuntu.
pub struct Apt;

fn apt_install(packages: &[String]) -> String {
  install_command(
    "DEBIAN_FRONTEND=noninteractive apt-get install -y --no-install-recommends",
    packages,
  )
}

impl PackageManager for Apt {
  fn commands(&self, _ctx: &BuildContext, request: &PackageRequest) -> Vec<String> {
    let packages = request.packages_for(PackageType::Deb);
    let mut commands = Vec::new();

    if !request.apt_keys.is_empty() {
      commands.push("apt-get update -y".to_string());
      commands.push(apt_install(&KEY_TOOLS.map(String::from)));
      commands.extend(request.apt_keys.iter().map(|key| format!("wget -qO - {key} | apt-key add -")));
    }

    if !request.apt_ppas.is_empty() {
      if request.apt_keys.is_empty() {
        commands.push("apt-get update -y".to_string());
      }
      commands.push(apt_install(&["software-properties-common".to_string()]));
      commands.extend(request.apt_ppas.iter().map(|ppa| format!("apt-add-repository {ppa} -y")));
    }

    for repository in &request.apt_repositories {
      if repository.starts_with("http://") || repository.starts_with("https://") {
        commands.push(format!("wget -qO - {repository} >> {SOURCES_LIST}"));
      } else {
        commands.push(format!("echo \"{repository}\" >> {SOURCES_LIST}"));
      }
    }

    if packages.is_empty() && commands.is_empty() {
      return commands;
    }
    if !packages.is_empty() {
      commands.push("apt-get update -y".to_string());
      commands.push(apt_install(&packages));
    }
    commands.push("rm -rf /var/lib/apt/lists/*".to_string());
    commands
  }
}
