use stagefile_lib::block::LicensePolicy;
use stagefile_lib::context::ContainerFormat;
use stagefile_lib::eval::{EvalError, RecipeOptions};

use super::common::TestRecipe;

const BASIC: &str = r#"
local s = recipe.stage{ image = "ubuntu:18.04" }
s:packages{ "wget" }
s:shell("echo hi")
s:environment{ X = 1 }
"#;

#[test]
fn basic_recipe_as_dockerfile() {
  assert_eq!(
    TestRecipe::new(BASIC).render(ContainerFormat::Docker),
    "FROM ubuntu:18.04\n\
     RUN apt-get update -y && \\\n    \
     DEBIAN_FRONTEND=noninteractive apt-get install -y --no-install-recommends \\\n        \
     wget && \\\n    \
     rm -rf /var/lib/apt/lists/*\n\
     RUN echo hi\n\
     ENV X=1"
  );
}

#[test]
fn basic_recipe_as_singularity_definition() {
  let rendered = TestRecipe::new(BASIC).render(ContainerFormat::Singularity);
  assert!(rendered.starts_with("BootStrap: docker\nFrom: ubuntu:18.04\n%post\n    . /.singularity.d/env/10-docker*.sh\n"));
  assert!(rendered.contains("%post\n    apt-get update -y\n"));
  assert!(rendered.ends_with("%post\n    echo hi\n%environment\n    export X=1"));
}

#[test]
fn recipes_can_branch_on_the_format() {
  let recipe = TestRecipe::new(
    r#"
      local s = recipe.stage{ image = "ubuntu:22.04" }
      if recipe.format == "singularity" then
        s:runscript("/opt/app")
      else
        s:workdir("/opt")
      end
    "#,
  );
  assert_eq!(recipe.render(ContainerFormat::Docker), "FROM ubuntu:22.04\nWORKDIR /opt");
  assert!(recipe.render(ContainerFormat::Singularity).ends_with("%runscript\n    exec /opt/app"));
}

#[test]
fn centos_stages_install_with_yum() {
  let rendered = TestRecipe::new(
    r#"
      local s = recipe.stage{ image = "nvidia/cuda:12.2.0-devel-centos7" }
      s:packages{ "make", "gcc", "make" }
    "#,
  )
  .render(ContainerFormat::Docker);
  assert!(rendered.contains("yum install -y \\\n        gcc \\\n        make"));
  assert!(rendered.contains("rm -rf /var/cache/yum/*"));
}

#[test]
fn userargs_reach_the_recipe() {
  let recipe = TestRecipe::new(
    r#"
      local s = recipe.stage{ image = "ubuntu:22.04" }
      s:gnu{ version = recipe.userarg.gcc }
    "#,
  );
  let mut options = RecipeOptions::new(ContainerFormat::Docker);
  options.userargs.insert("gcc".into(), "12".into());
  assert!(recipe.render_with(&options).unwrap().contains("gcc-12"));
}

#[test]
fn blob_paths_resolve_next_to_the_recipe() {
  let recipe = TestRecipe::new(
    r#"
      local s = recipe.stage{ image = "ubuntu:22.04" }
      s:blob{ docker = "extra.docker" }
    "#,
  )
  .with_file("extra.docker", "HEALTHCHECK CMD true");
  assert!(recipe.render(ContainerFormat::Docker).ends_with("HEALTHCHECK CMD true"));
}

#[test]
fn recipe_parts_can_be_split_across_files() {
  let recipe = TestRecipe::new(
    r#"
      local versions = require("versions")
      local s = recipe.stage{ image = "ubuntu:22.04" }
      dofile("compilers.lua")(s, versions.gcc)
    "#,
  )
  .with_file("versions.lua", "return { gcc = '11' }")
  .with_file("compilers.lua", "return function(s, v) s:gnu{ version = v, fortran = false } end");
  assert!(recipe.render(ContainerFormat::Docker).contains("g++-11"));
}

#[test]
fn nvhpc_needs_the_eula_unless_warned() {
  let recipe = TestRecipe::new(
    r#"
      local s = recipe.stage{ image = "ubuntu:22.04" }
      s:nvhpc{ version = "24.1" }
    "#,
  );

  let err = recipe
    .render_with(&RecipeOptions::new(ContainerFormat::Docker))
    .unwrap_err();
  assert!(matches!(err, EvalError::Lua(_)));
  assert!(err.to_string().contains("nvhpc"));

  let options = RecipeOptions {
    license_policy: LicensePolicy::Warn,
    ..RecipeOptions::new(ContainerFormat::Docker)
  };
  assert!(recipe.render_with(&options).unwrap().contains("NVHPC_SILENT=true"));
}

#[test]
fn bash_scripts_skip_container_only_instructions() {
  let rendered = TestRecipe::new(
    r#"
      local s = recipe.stage{ image = "ubuntu:22.04" }
      s:copy{ src = "a", dest = "/opt/a" }
      s:arg{ VERSION = "1.0" }
      s:shell("make")
    "#,
  )
  .render(ContainerFormat::Bash);
  assert_eq!(rendered, "#!/bin/bash -ex\nVERSION=${VERSION:-\"1.0\"}\nmake");
}
