//! Core module tests
//!
//! Contains test suites for core functionality:
//! - Accelerator parsing tests
//! - Rule evaluation tests
//! - Rule encoding tests
//! - Menu hierarchy validation tests
//! - Profile resolution tests

#[cfg(test)]
mod fixtures;
