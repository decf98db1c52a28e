//! Shared types.

pub mod analysis;
pub mod config;
pub mod errors;
