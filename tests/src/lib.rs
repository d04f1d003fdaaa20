//! # Micro-Frontend Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── properties.rs   # Bus invariants under randomized operation sequences
//!     └── flows.rs        # Host, modules and slot working together
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p mf-tests
//!
//! # By category
//! cargo test -p mf-tests integration::properties::
//! cargo test -p mf-tests integration::flows::
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
