//! stagefile-lib: container recipe generation for HPC software stacks.
//!
//! A recipe is an ordered list of stages. Each stage starts from a base image,
//! which fixes its [`BuildContext`](context::BuildContext) (distribution,
//! package family, CPU architecture), and then collects primitives, either
//! written directly or produced by building blocks. The same recipe renders
//! to a Dockerfile, a Singularity definition file or a bash script.
//!
//! - [`primitive`]: the instruction IR and [`merge`](primitive::merge)
//! - [`render`]: one renderer per container format
//! - [`block`]: building blocks (`packages`, `gnu`, `generic_autotools`, `nvhpc`)
//! - [`stage`]: `Stage` and `Recipe` assembly
//! - [`eval`]: evaluating a Lua recipe file into a `Recipe`

pub mod block;
pub mod context;
pub mod eval;
pub mod lua;
pub mod packages;
pub mod platform;
pub mod primitive;
pub mod render;
pub mod stage;
pub mod toolchain;
