mod common;
mod multistage_tests;
mod recipe_tests;
