//! Cross-crate integration tests.

pub mod properties;
