// File: agoradeals-core/src/test_utils/mod.rs
//! Fixtures shared by unit and integration tests.

pub mod helpers;

pub use helpers::*;
