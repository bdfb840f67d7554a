use super::{BlockError, BuildingBlock};
use crate::context::BuildContext;
use crate::packages::{PackageRequest, package_manager};
use crate::primitive::Primitive;

/// Install OS packages with the stage's package manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packages {
  request: PackageRequest,
}

impl Packages {
  pub fn new(request: PackageRequest) -> Self {
    Self { request }
  }

  pub fn request(&self) -> &PackageRequest {
    &self.request
  }
}

impl BuildingBlock for Packages {
  fn name(&self) -> &str {
    "packages"
  }

  fn primitives(&self, ctx: &BuildContext) -> Result<Vec<Primitive>, BlockError> {
    Ok(package_manager(ctx).install(ctx, &self.request).into_iter().collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::ContainerFormat;
  use crate::primitive::BaseImage;

  #[test]
  fn installs_with_the_stage_package_manager() {
    let block = Packages::new(PackageRequest::new(["wget"]));
    let ctx = BuildContext::new(ContainerFormat::Docker).with_base_image(&BaseImage::new("centos:7"));
    let primitives = block.primitives(&ctx).unwrap();
    assert_eq!(primitives.len(), 1);
    assert!(primitives[0].render(&ctx).unwrap().starts_with("RUN yum install -y"));
  }

  #[test]
  fn nothing_to_install() {
    let ctx = BuildContext::new(ContainerFormat::Docker);
    assert!(Packages::default().primitives(&ctx).unwrap().is_empty());
  }
}
