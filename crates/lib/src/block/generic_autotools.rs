use serde::{Deserialize, Serialize};

use super::{BlockError, BuildingBlock, fetch_tarball};
use crate::context::BuildContext;
use crate::primitive::{Comment, Copy, Environment, Primitive, Shell};
use crate::toolchain::Toolchain;

const BLOCK: &str = "generic_autotools";

/// Build and install a package that uses `./configure && make && make install`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenericAutotools {
  /// Name used for runtime exclusion and the ldconfig file. Defaults to the source directory.
  pub name: Option<String>,
  /// Source archive to download. Required.
  pub url: Option<String>,
  pub prefix: String,
  /// Directory the archive unpacks into, when it is not the archive name.
  pub directory: Option<String>,
  pub configure_opts: Vec<String>,
  /// Commands run in the source directory before configure.
  pub preconfigure: Vec<String>,
  /// Commands run after installation.
  pub postinstall: Vec<String>,
  /// Add the prefix to `PATH` (and `LD_LIBRARY_PATH` unless `ldconfig` is set).
  pub environment: bool,
  /// Register the library directory with the dynamic linker.
  pub ldconfig: bool,
  pub make: bool,
  pub install: bool,
  pub check: bool,
  pub toolchain: Toolchain,
}

impl Default for GenericAutotools {
  fn default() -> Self {
    Self {
      name: None,
      url: None,
      prefix: "/usr/local".to_string(),
      directory: None,
      configure_opts: Vec::new(),
      preconfigure: Vec::new(),
      postinstall: Vec::new(),
      environment: false,
      ldconfig: false,
      make: true,
      install: true,
      check: false,
      toolchain: Toolchain::default(),
    }
  }
}

impl GenericAutotools {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      url: Some(url.into()),
      ..Self::default()
    }
  }

  fn url(&self) -> Result<&str, BlockError> {
    self.url.as_deref().ok_or_else(|| BlockError::MissingParameter {
      block: self.name().to_string(),
      parameter: "url",
    })
  }

  fn ldconfig_command(&self) -> String {
    format!(
      "echo \"{}/lib\" >> /etc/ld.so.conf.d/{}.conf && ldconfig",
      self.prefix.trim_end_matches('/'),
      self.name().replace('/', "_")
    )
  }

  fn environment(&self) -> Option<Primitive> {
    if !self.environment {
      return None;
    }
    let prefix = self.prefix.trim_end_matches('/');
    let mut variables = vec![("PATH".to_string(), format!("{prefix}/bin:$PATH"))];
    if !self.ldconfig {
      variables.push(("LD_LIBRARY_PATH".to_string(), format!("{prefix}/lib:$LD_LIBRARY_PATH")));
    }
    Some(Environment::new(variables).into())
  }
}

impl BuildingBlock for GenericAutotools {
  fn name(&self) -> &str {
    self.name.as_deref().or(self.directory.as_deref()).unwrap_or(BLOCK)
  }

  fn primitives(&self, ctx: &BuildContext) -> Result<Vec<Primitive>, BlockError> {
    let url = self.url()?;
    let tarball = fetch_tarball(ctx, self.name(), url, self.directory.as_deref())?;

    let mut commands = tarball.fetch;
    commands.push(format!("cd {}", tarball.directory));
    commands.extend(self.preconfigure.iter().cloned());

    let mut configure = vec![];
    let prefix = self.toolchain.command_prefix();
    if !prefix.is_empty() {
      configure.push(prefix);
    }
    configure.push(format!("./configure --prefix={}", self.prefix));
    configure.extend(self.configure_opts.iter().cloned());
    commands.push(configure.join(" "));

    if self.make {
      commands.push("make -j$(nproc)".to_string());
    }
    if self.check {
      commands.push("make -j$(nproc) check".to_string());
    }
    if self.install {
      commands.push("make -j$(nproc) install".to_string());
    }
    commands.extend(self.postinstall.iter().cloned());
    if self.ldconfig {
      commands.push(self.ldconfig_command());
    }
    commands.push(tarball.cleanup);

    let mut primitives: Vec<Primitive> = vec![
      Comment::new(url).with_reformat(false).into(),
      Shell::new(commands).into(),
    ];
    primitives.extend(self.environment());
    Ok(primitives)
  }

  fn runtime(&self, _ctx: &BuildContext, from: &str) -> Result<Vec<Primitive>, BlockError> {
    let url = self.url()?;
    let mut primitives: Vec<Primitive> = vec![
      Comment::new(url).with_reformat(false).into(),
      Copy::new(&self.prefix, &self.prefix).with_from(from).into(),
    ];
    if self.ldconfig {
      primitives.push(Shell::new([self.ldconfig_command()]).into());
    }
    primitives.extend(self.environment());
    Ok(primitives)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::ContainerFormat;
  use crate::primitive::BaseImage;
  use crate::toolchain::ToolchainVar;

  const URL: &str = "https://ftpmirror.gnu.org/hello/hello-2.12.tar.gz";

  fn ctx(format: ContainerFormat) -> BuildContext {
    BuildContext::new(format).with_base_image(&BaseImage::new("ubuntu:22.04"))
  }

  #[test]
  fn builds_with_toolchain() {
    let block = GenericAutotools {
      prefix: "/opt/hello".into(),
      configure_opts: vec!["--disable-nls".into()],
      toolchain: Toolchain::new().with(ToolchainVar::Cc, "gcc").with(ToolchainVar::Cflags, "-O2"),
      ..GenericAutotools::new(URL)
    };
    let primitives = block.primitives(&ctx(ContainerFormat::Docker)).unwrap();
    assert_eq!(primitives.len(), 2);
    let Primitive::Shell(shell) = &primitives[1] else {
      panic!("expected shell");
    };
    assert_eq!(
      shell.commands,
      vec![
        "mkdir -p /var/tmp && wget -q -nc --no-check-certificate -P /var/tmp https://ftpmirror.gnu.org/hello/hello-2.12.tar.gz",
        "mkdir -p /var/tmp && tar -x -f /var/tmp/hello-2.12.tar.gz -C /var/tmp -z",
        "cd /var/tmp/hello-2.12",
        "CC=gcc CFLAGS=-O2 ./configure --prefix=/opt/hello --disable-nls",
        "make -j$(nproc)",
        "make -j$(nproc) install",
        "rm -rf /var/tmp/hello-2.12 /var/tmp/hello-2.12.tar.gz",
      ]
    );
  }

  #[test]
  fn missing_url_is_fatal() {
    let err = GenericAutotools::default()
      .primitives(&ctx(ContainerFormat::Docker))
      .unwrap_err();
    assert_eq!(
      err,
      BlockError::MissingParameter {
        block: "generic_autotools".into(),
        parameter: "url",
      }
    );
  }

  #[test]
  fn ldconfig_and_environment() {
    let block = GenericAutotools {
      name: Some("hello".into()),
      prefix: "/opt/hello".into(),
      ldconfig: true,
      environment: true,
      check: true,
      ..GenericAutotools::new(URL)
    };
    let ctx = ctx(ContainerFormat::Docker);
    let rendered: Vec<String> = block
      .primitives(&ctx)
      .unwrap()
      .iter()
      .map(|p| p.render(&ctx).unwrap())
      .collect();
    assert_eq!(rendered[0], format!("# {URL}"));
    assert!(rendered[1].contains("make -j$(nproc) check"));
    assert!(rendered[1].contains("echo \"/opt/hello/lib\" >> /etc/ld.so.conf.d/hello.conf && ldconfig"));
    assert_eq!(rendered[2], "ENV PATH=/opt/hello/bin:$PATH");
  }

  #[test]
  fn runtime_copies_the_prefix() {
    let block = GenericAutotools {
      prefix: "/opt/hello".into(),
      ..GenericAutotools::new(URL)
    };
    let ctx = ctx(ContainerFormat::Singularity);
    let runtime = block.runtime(&ctx, "devel").unwrap();
    assert_eq!(runtime[1].render(&ctx).unwrap(), "%files from devel\n    /opt/hello /opt/hello");
  }

  #[test]
  fn options_reject_unknown_keys() {
    let err = serde_json::from_str::<GenericAutotools>(r#"{"url": "x.tar.gz", "prefx": "/opt"}"#).unwrap_err();
    assert!(err.to_string().contains("unknown field"));
  }
}
