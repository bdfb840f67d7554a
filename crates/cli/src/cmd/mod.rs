mod info;
mod render;

pub use info::cmd_info;
pub use render::{RenderArgs, cmd_render};
