//! Test infrastructure shared by unit and integration tests
//!
//! This module provides:
//! - Recording and scripted doubles for the platform collaborators
//! - An in-memory filesystem for the driver scan and restart monitor
//! - Fixture builders for metadata and client setups

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
