//! End-to-end tests for the precompilation pipeline.

mod common;
mod failure_tests;
mod hierarchy_tests;
mod provision_tests;
mod render_tests;
