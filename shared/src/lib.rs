//! Shared types for the Osprey marketplace backend
//!
//! Common types used across crates: the unified error system, domain
//! status enums with their transition rules, and utility helpers.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};
