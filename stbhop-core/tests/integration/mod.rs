//! Integration test modules

mod console_tests;
mod runner_tests;
mod support;
