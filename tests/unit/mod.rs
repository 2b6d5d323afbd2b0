//! Unit tests for individual components

mod error_test;
mod config_test;
mod registry_test;
mod progress_test;
