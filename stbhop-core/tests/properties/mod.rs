//! Property test modules

mod address_tests;
mod auth_prompt_tests;
mod catalog_tests;
mod runner_tests;
