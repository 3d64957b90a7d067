//! Utility helpers shared across the crate.

pub mod human_format;
