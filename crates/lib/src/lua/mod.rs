//! Lua recipe front-end.
//!
//! A recipe is a Lua 5.4 script. It sees a `recipe` global holding the
//! recipe-wide options and a `recipe.stage{...}` constructor; stage handles
//! expose one method per primitive and per building block.
//!
//! # Submodules
//!
//! - [`globals`] - the `recipe` table
//! - [`loaders`] - file loading with a per-file `__dir`
//! - [`runtime`] - Lua VM setup
//! - [`stage`] - the stage handle userdata

pub mod globals;
pub mod loaders;
pub mod runtime;
pub mod stage;
