use stagefile_lib::context::ContainerFormat;
use stagefile_lib::eval::{RecipeOptions, evaluate_recipe};
use stagefile_lib::platform::Version;

use super::common::TestRecipe;

const TWO_STAGE: &str = r#"
local devel = recipe.stage{ image = "ubuntu:22.04", name = "devel" }
local tc = devel:gnu()
devel:generic_autotools{
  name = "zlib",
  url = "https://zlib.net/zlib-1.3.1.tar.gz",
  prefix = "/usr/local/zlib",
  toolchain = tc.toolchain,
}

local rt = recipe.stage{ image = "ubuntu:22.04" }
rt:runtime(devel)
"#;

#[test]
fn docker_runtime_stage_copies_from_devel() {
  let rendered = TestRecipe::new(TWO_STAGE).render(ContainerFormat::Docker);
  let (devel, runtime) = rendered.split_once("\n\n").unwrap();
  assert!(devel.starts_with("FROM ubuntu:22.04 AS devel"));
  assert!(devel.contains("CC=gcc CXX=g++ F77=gfortran F90=gfortran FC=gfortran ./configure --prefix=/usr/local/zlib"));
  assert!(runtime.contains("libgfortran5"));
  assert!(runtime.contains("COPY --from=devel /usr/local/zlib /usr/local/zlib"));
}

#[test]
fn singularity_runtime_stage_uses_files_from() {
  let rendered = TestRecipe::new(TWO_STAGE).render(ContainerFormat::Singularity);
  assert!(rendered.contains("Stage: devel"));
  assert!(rendered.contains("%files from devel\n    /usr/local/zlib /usr/local/zlib"));
}

#[test]
fn old_singularity_cannot_render_two_stages() {
  let recipe = TestRecipe::new(TWO_STAGE);
  let options = RecipeOptions {
    singularity_version: Version::new(3, 1),
    ..RecipeOptions::new(ContainerFormat::Singularity)
  };
  let evaluated = evaluate_recipe(&recipe.path, &options).unwrap();
  let err = evaluated.render(false).unwrap_err();
  assert!(err.to_string().contains("3.2"));
}

#[test]
fn merging_folds_adjacent_instructions() {
  let recipe = TestRecipe::new(
    r#"
      local s = recipe.stage{ image = "ubuntu:22.04" }
      s:environment{ A = 1 }
      s:environment{ B = 2 }
      s:label{ maintainer = "hpc" }
    "#,
  );
  let evaluated = evaluate_recipe(&recipe.path, &RecipeOptions::default()).unwrap();
  assert_eq!(
    evaluated.render(true).unwrap(),
    "FROM ubuntu:22.04\nENV A=1 \\\n    B=2\nLABEL maintainer=hpc"
  );
}

#[test]
fn ir_serializes_every_stage() {
  let recipe = TestRecipe::new(TWO_STAGE);
  let evaluated = evaluate_recipe(&recipe.path, &RecipeOptions::default()).unwrap();
  let json = serde_json::to_value(evaluated.ir()).unwrap();
  assert_eq!(json.as_array().unwrap().len(), 2);
  assert_eq!(json[0]["package_type"], "deb");
  assert_eq!(json[1]["primitives"][0]["image"], "ubuntu:22.04");
}

#[test]
fn unnamed_source_stage_is_referenced_by_index() {
  let recipe = TestRecipe::new(&TWO_STAGE.replace(r#", name = "devel""#, ""));
  let rendered = recipe.render(ContainerFormat::Docker);
  assert!(rendered.contains("COPY --from=0 /usr/local/zlib /usr/local/zlib"));

  let err = recipe
    .render_with(&RecipeOptions::new(ContainerFormat::Singularity))
    .unwrap_err();
  assert!(err.to_string().contains("needs a name"));
}
