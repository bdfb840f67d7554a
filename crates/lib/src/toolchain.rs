//! Compiler and linker settings passed from one building block to the next.
//!
//! A compiler block exposes the [`Toolchain`] it installed; a later block that
//! builds from source takes it as configuration and prefixes its configure
//! step with the variables that are set. The value is never modified in
//! place: [`Toolchain::with`], [`Toolchain::overlay`] and
//! [`Toolchain::fill_unset`] each return a new toolchain, so a block can
//! adjust settings without affecting anyone else holding the original.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::render::text::shell_quote;

/// Variable names a toolchain can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolchainVar {
  Cc,
  Cflags,
  Cppflags,
  CudaHome,
  Cxx,
  Cxxflags,
  F77,
  F90,
  Fc,
  Fcflags,
  Fflags,
  Flibs,
  LdLibraryPath,
  Ldflags,
  Libs,
}

impl ToolchainVar {
  pub const ALL: [ToolchainVar; 15] = [
    Self::Cc,
    Self::Cflags,
    Self::Cppflags,
    Self::CudaHome,
    Self::Cxx,
    Self::Cxxflags,
    Self::F77,
    Self::F90,
    Self::Fc,
    Self::Fcflags,
    Self::Fflags,
    Self::Flibs,
    Self::LdLibraryPath,
    Self::Ldflags,
    Self::Libs,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Cc => "CC",
      Self::Cflags => "CFLAGS",
      Self::Cppflags => "CPPFLAGS",
      Self::CudaHome => "CUDA_HOME",
      Self::Cxx => "CXX",
      Self::Cxxflags => "CXXFLAGS",
      Self::F77 => "F77",
      Self::F90 => "F90",
      Self::Fc => "FC",
      Self::Fcflags => "FCFLAGS",
      Self::Fflags => "FFLAGS",
      Self::Flibs => "FLIBS",
      Self::LdLibraryPath => "LD_LIBRARY_PATH",
      Self::Ldflags => "LDFLAGS",
      Self::Libs => "LIBS",
    }
  }
}

impl fmt::Display for ToolchainVar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for ToolchainVar {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|var| var.as_str().eq_ignore_ascii_case(s))
      .ok_or_else(|| format!("unknown toolchain variable: {s}"))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Toolchain {
  #[serde(rename = "CC", default, skip_serializing_if = "Option::is_none")]
  cc: Option<String>,
  #[serde(rename = "CFLAGS", default, skip_serializing_if = "Option::is_none")]
  cflags: Option<String>,
  #[serde(rename = "CPPFLAGS", default, skip_serializing_if = "Option::is_none")]
  cppflags: Option<String>,
  #[serde(rename = "CUDA_HOME", default, skip_serializing_if = "Option::is_none")]
  cuda_home: Option<String>,
  #[serde(rename = "CXX", default, skip_serializing_if = "Option::is_none")]
  cxx: Option<String>,
  #[serde(rename = "CXXFLAGS", default, skip_serializing_if = "Option::is_none")]
  cxxflags: Option<String>,
  #[serde(rename = "F77", default, skip_serializing_if = "Option::is_none")]
  f77: Option<String>,
  #[serde(rename = "F90", default, skip_serializing_if = "Option::is_none")]
  f90: Option<String>,
  #[serde(rename = "FC", default, skip_serializing_if = "Option::is_none")]
  fc: Option<String>,
  #[serde(rename = "FCFLAGS", default, skip_serializing_if = "Option::is_none")]
  fcflags: Option<String>,
  #[serde(rename = "FFLAGS", default, skip_serializing_if = "Option::is_none")]
  fflags: Option<String>,
  #[serde(rename = "FLIBS", default, skip_serializing_if = "Option::is_none")]
  flibs: Option<String>,
  #[serde(rename = "LD_LIBRARY_PATH", default, skip_serializing_if = "Option::is_none")]
  ld_library_path: Option<String>,
  #[serde(rename = "LDFLAGS", default, skip_serializing_if = "Option::is_none")]
  ldflags: Option<String>,
  #[serde(rename = "LIBS", default, skip_serializing_if = "Option::is_none")]
  libs: Option<String>,
}

impl Toolchain {
  pub fn new() -> Self {
    Self::default()
  }

  fn slot(&self, var: ToolchainVar) -> &Option<String> {
    match var {
      ToolchainVar::Cc => &self.cc,
      ToolchainVar::Cflags => &self.cflags,
      ToolchainVar::Cppflags => &self.cppflags,
      ToolchainVar::CudaHome => &self.cuda_home,
      ToolchainVar::Cxx => &self.cxx,
      ToolchainVar::Cxxflags => &self.cxxflags,
      ToolchainVar::F77 => &self.f77,
      ToolchainVar::F90 => &self.f90,
      ToolchainVar::Fc => &self.fc,
      ToolchainVar::Fcflags => &self.fcflags,
      ToolchainVar::Fflags => &self.fflags,
      ToolchainVar::Flibs => &self.flibs,
      ToolchainVar::LdLibraryPath => &self.ld_library_path,
      ToolchainVar::Ldflags => &self.ldflags,
      ToolchainVar::Libs => &self.libs,
    }
  }

  fn slot_mut(&mut self, var: ToolchainVar) -> &mut Option<String> {
    match var {
      ToolchainVar::Cc => &mut self.cc,
      ToolchainVar::Cflags => &mut self.cflags,
      ToolchainVar::Cppflags => &mut self.cppflags,
      ToolchainVar::CudaHome => &mut self.cuda_home,
      ToolchainVar::Cxx => &mut self.cxx,
      ToolchainVar::Cxxflags => &mut self.cxxflags,
      ToolchainVar::F77 => &mut self.f77,
      ToolchainVar::F90 => &mut self.f90,
      ToolchainVar::Fc => &mut self.fc,
      ToolchainVar::Fcflags => &mut self.fcflags,
      ToolchainVar::Fflags => &mut self.fflags,
      ToolchainVar::Flibs => &mut self.flibs,
      ToolchainVar::LdLibraryPath => &mut self.ld_library_path,
      ToolchainVar::Ldflags => &mut self.ldflags,
      ToolchainVar::Libs => &mut self.libs,
    }
  }

  /// A copy with `var` set to `value`.
  pub fn with(&self, var: ToolchainVar, value: impl Into<String>) -> Self {
    let mut next = self.clone();
    *next.slot_mut(var) = Some(value.into());
    next
  }

  pub fn get(&self, var: ToolchainVar) -> Option<&str> {
    self.slot(var).as_deref()
  }

  pub fn is_empty(&self) -> bool {
    ToolchainVar::ALL.iter().all(|var| self.slot(*var).is_none())
  }

  /// A copy where every variable set in `other` replaces ours.
  ///
  /// Replacing a different value is allowed but logged.
  pub fn overlay(&self, other: &Toolchain) -> Self {
    let mut next = self.clone();
    for var in ToolchainVar::ALL {
      let Some(value) = other.get(var) else { continue };
      if let Some(current) = self.get(var)
        && current != value
      {
        warn!(var = %var, current, replacement = value, "overwriting toolchain variable");
      }
      *next.slot_mut(var) = Some(value.to_string());
    }
    next
  }

  /// A copy where variables we leave unset are taken from `defaults`.
  pub fn fill_unset(&self, defaults: &Toolchain) -> Self {
    let mut next = self.clone();
    for var in ToolchainVar::ALL {
      if next.slot(var).is_none()
        && let Some(value) = defaults.get(var)
      {
        *next.slot_mut(var) = Some(value.to_string());
      }
    }
    next
  }

  /// The set variables as `(NAME, value)` pairs in a fixed order.
  pub fn vars(&self) -> Vec<(&'static str, &str)> {
    ToolchainVar::ALL
      .iter()
      .filter_map(|var| self.get(*var).map(|value| (var.as_str(), value)))
      .collect()
  }

  /// `NAME=value` words for prefixing a command, e.g. `CC=gcc ./configure`.
  pub fn command_prefix(&self) -> String {
    self
      .vars()
      .iter()
      .map(|(name, value)| format!("{name}={}", shell_quote(value)))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

#[cfg(test)]
mod tests {
  use tracing_test::traced_test;

  use super::*;

  fn gnu() -> Toolchain {
    Toolchain::new()
      .with(ToolchainVar::Cc, "gcc")
      .with(ToolchainVar::Cxx, "g++")
      .with(ToolchainVar::Fc, "gfortran")
  }

  #[test]
  fn with_returns_a_new_value() {
    let base = Toolchain::new();
    let set = base.with(ToolchainVar::Cc, "gcc");
    assert!(base.is_empty());
    assert_eq!(set.get(ToolchainVar::Cc), Some("gcc"));
  }

  #[test]
  fn fill_unset_keeps_caller_values() {
    let caller = Toolchain::new().with(ToolchainVar::Cppflags, "-I/opt/include");
    let filled = caller.fill_unset(&Toolchain::new().with(ToolchainVar::Cppflags, "-DNDEBUG").with(ToolchainVar::Cc, "gcc"));
    assert_eq!(filled.get(ToolchainVar::Cppflags), Some("-I/opt/include"));
    assert_eq!(filled.get(ToolchainVar::Cc), Some("gcc"));
  }

  #[test]
  #[traced_test]
  fn overlay_warns_when_replacing() {
    let nv = Toolchain::new().with(ToolchainVar::Cc, "nvc");
    let merged = gnu().overlay(&nv);
    assert_eq!(merged.get(ToolchainVar::Cc), Some("nvc"));
    assert_eq!(merged.get(ToolchainVar::Cxx), Some("g++"));
    assert!(logs_contain("overwriting toolchain variable"));
  }

  #[test]
  fn contradictory_fields_are_legal() {
    let partial = Toolchain::new().with(ToolchainVar::Cc, "clang");
    assert_eq!(partial.get(ToolchainVar::Cxx), None);
    assert_eq!(partial.command_prefix(), "CC=clang");
  }

  #[test]
  fn vars_in_fixed_order() {
    assert_eq!(gnu().vars(), vec![("CC", "gcc"), ("CXX", "g++"), ("FC", "gfortran")]);
    assert_eq!(gnu().command_prefix(), "CC=gcc CXX=g++ FC=gfortran");
  }

  #[test]
  fn prefix_quotes_values_with_spaces() {
    let toolchain = Toolchain::new()
      .with(ToolchainVar::Cc, "gcc")
      .with(ToolchainVar::Cflags, "-O2 -march=native");
    assert_eq!(toolchain.command_prefix(), "CC=gcc CFLAGS='-O2 -march=native'");
  }

  #[test]
  fn serializes_with_upper_case_names() {
    let json = serde_json::to_value(gnu()).unwrap();
    assert_eq!(json, serde_json::json!({"CC": "gcc", "CXX": "g++", "FC": "gfortran"}));

    let parsed: Toolchain = serde_json::from_value(serde_json::json!({"CUDA_HOME": "/usr/local/cuda"})).unwrap();
    assert_eq!(parsed.get(ToolchainVar::CudaHome), Some("/usr/local/cuda"));
    assert!(serde_json::from_value::<Toolchain>(serde_json::json!({"cc": "gcc"})).is_err());
  }

  #[test]
  fn var_names_parse_case_insensitively() {
    assert_eq!("ld_library_path".parse::<ToolchainVar>(), Ok(ToolchainVar::LdLibraryPath));
    assert!("CCC".parse::<ToolchainVar>().is_err());
  }
}
