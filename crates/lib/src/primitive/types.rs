use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::platform::{CpuArch, DistroSpec};

fn default_true() -> bool {
  true
}

fn default_bootstrap() -> String {
  "docker".to_string()
}

fn is_true(value: &bool) -> bool {
  *value
}

/// The image a stage starts from.
///
/// Besides rendering to `FROM`/`BootStrap`, a base image is what resolves a
/// stage's [`BuildContext`](crate::context::BuildContext): the distribution
/// and architecture are inferred from `image` unless overridden here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseImage {
  pub image: String,
  /// Stage name for multi-stage builds (`AS <stage>` / `Stage: <stage>`).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stage: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub distro: Option<DistroSpec>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub arch: Option<CpuArch>,
  /// Source the Docker environment in Singularity builds.
  #[serde(default = "default_true")]
  pub docker_env: bool,
  /// Singularity bootstrap agent.
  #[serde(default = "default_bootstrap")]
  pub bootstrap: String,
}

impl BaseImage {
  pub fn new(image: impl Into<String>) -> Self {
    Self {
      image: image.into(),
      stage: None,
      distro: None,
      arch: None,
      docker_env: true,
      bootstrap: default_bootstrap(),
    }
  }

  pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
    self.stage = Some(stage.into());
    self
  }

  pub fn with_distro(mut self, distro: DistroSpec) -> Self {
    self.distro = Some(distro);
    self
  }

  pub fn with_arch(mut self, arch: CpuArch) -> Self {
    self.arch = Some(arch);
    self
  }

  pub fn with_docker_env(mut self, docker_env: bool) -> Self {
    self.docker_env = docker_env;
    self
  }
}

/// Shell commands run at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Shell {
  pub commands: Vec<String>,
  /// Start from `/`, the way every Docker `RUN` does.
  #[serde(default)]
  pub chdir: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub app: Option<String>,
}

impl Shell {
  pub fn new<I, S>(commands: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      commands: commands.into_iter().map(Into::into).collect(),
      chdir: false,
      app: None,
    }
  }

  pub fn with_chdir(mut self, chdir: bool) -> Self {
    self.chdir = chdir;
    self
  }

  pub fn with_app(mut self, app: impl Into<String>) -> Self {
    self.app = Some(app.into());
    self
  }

  /// Commands with empty entries removed.
  pub fn effective_commands(&self) -> impl Iterator<Item = &str> {
    self.commands.iter().map(String::as_str).filter(|c| !c.is_empty())
  }
}

/// One or more sources copied to a single destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CopyEntry {
  pub sources: Vec<String>,
  pub dest: String,
}

impl CopyEntry {
  /// Destinations that do not exist yet when Singularity stages `%files`.
  pub fn is_tmp_destination(&self) -> bool {
    is_tmp_path(&self.dest)
  }
}

fn is_tmp_path(dest: &str) -> bool {
  ["/tmp", "/var/tmp"]
    .iter()
    .any(|tmp| dest == *tmp || dest.strip_prefix(tmp).is_some_and(|rest| rest.starts_with('/')))
}

/// Files copied from the build host or another stage into the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Copy {
  pub entries: Vec<CopyEntry>,
  /// Stage to copy from (`COPY --from` / `%files from`).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub from: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub chown: Option<String>,
  /// Patterns left out of the copy.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub exclude: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub app: Option<String>,
}

impl Copy {
  pub fn new(src: impl Into<String>, dest: impl Into<String>) -> Self {
    Self::from_entries(vec![CopyEntry {
      sources: vec![src.into()],
      dest: dest.into(),
    }])
  }

  /// Several sources into one destination directory.
  pub fn many<I, S>(sources: I, dest: impl Into<String>) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::from_entries(vec![CopyEntry {
      sources: sources.into_iter().map(Into::into).collect(),
      dest: dest.into(),
    }])
  }

  /// A set of `source -> destination` pairs, each copied on its own.
  pub fn files<I, S, D>(files: I) -> Self
  where
    I: IntoIterator<Item = (S, D)>,
    S: Into<String>,
    D: Into<String>,
  {
    Self::from_entries(
      files
        .into_iter()
        .map(|(src, dest)| CopyEntry {
          sources: vec![src.into()],
          dest: dest.into(),
        })
        .collect(),
    )
  }

  pub fn from_entries(entries: Vec<CopyEntry>) -> Self {
    Self {
      entries,
      from: None,
      chown: None,
      exclude: Vec::new(),
      app: None,
    }
  }

  pub fn with_from(mut self, stage: impl Into<String>) -> Self {
    self.from = Some(stage.into());
    self
  }

  pub fn with_chown(mut self, owner: impl Into<String>) -> Self {
    self.chown = Some(owner.into());
    self
  }

  pub fn with_exclude<I, S>(mut self, patterns: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.exclude = patterns.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_app(mut self, app: impl Into<String>) -> Self {
    self.app = Some(app.into());
    self
  }
}

/// Environment variables for the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Environment {
  pub variables: BTreeMap<String, String>,
  /// Also export the variables for the rest of a Singularity build.
  #[serde(default)]
  pub export: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub app: Option<String>,
}

impl Environment {
  pub fn new<I, K, V>(variables: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      variables: variables.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
      export: false,
      app: None,
    }
  }

  pub fn with_export(mut self, export: bool) -> Self {
    self.export = export;
    self
  }

  pub fn with_app(mut self, app: impl Into<String>) -> Self {
    self.app = Some(app.into());
    self
  }
}

/// Image metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Label {
  pub labels: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub app: Option<String>,
}

impl Label {
  pub fn new<I, K, V>(labels: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      labels: labels.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
      app: None,
    }
  }

  pub fn with_app(mut self, app: impl Into<String>) -> Self {
    self.app = Some(app.into());
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Comment {
  pub text: String,
  /// Word-wrap the text to 70 columns.
  #[serde(default = "default_true", skip_serializing_if = "is_true")]
  pub reformat: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub app: Option<String>,
}

impl Comment {
  pub fn new(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      reformat: true,
      app: None,
    }
  }

  pub fn with_reformat(mut self, reformat: bool) -> Self {
    self.reformat = reformat;
    self
  }

  pub fn with_app(mut self, app: impl Into<String>) -> Self {
    self.app = Some(app.into());
    self
  }
}

/// Verbatim text per format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Raw {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docker: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub singularity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Workdir {
  pub directory: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub app: Option<String>,
}

impl Workdir {
  pub fn new(directory: impl Into<String>) -> Self {
    Self {
      directory: directory.into(),
      app: None,
    }
  }

  pub fn with_app(mut self, app: impl Into<String>) -> Self {
    self.app = Some(app.into());
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct User {
  pub user: String,
}

impl User {
  pub fn new(user: impl Into<String>) -> Self {
    Self { user: user.into() }
  }
}

/// Build arguments. An empty value declares the argument without a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Arg {
  pub variables: BTreeMap<String, String>,
}

impl Arg {
  pub fn new<I, K, V>(variables: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      variables: variables.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
    }
  }
}

/// What the container runs by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Runscript {
  pub commands: Vec<String>,
  /// Prefix a single Singularity runscript command with `exec`.
  #[serde(default = "default_true", skip_serializing_if = "is_true")]
  pub exec: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub app: Option<String>,
}

impl Runscript {
  pub fn new<I, S>(commands: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      commands: commands.into_iter().map(Into::into).collect(),
      exec: true,
      app: None,
    }
  }

  pub fn with_exec(mut self, exec: bool) -> Self {
    self.exec = exec;
    self
  }

  pub fn with_app(mut self, app: impl Into<String>) -> Self {
    self.app = Some(app.into());
    self
  }
}

/// Pre-written fragments inserted as-is, one per format.
///
/// The fragments are read when the blob is created so that rendering never
/// touches the filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docker: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub singularity: Option<String>,
}

impl Blob {
  pub fn from_files(docker: Option<&Path>, singularity: Option<&Path>) -> io::Result<Self> {
    Ok(Self {
      docker: docker.map(fs::read_to_string).transpose()?,
      singularity: singularity.map(fs::read_to_string).transpose()?,
    })
  }
}
