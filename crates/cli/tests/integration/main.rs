mod common;
mod render_tests;
