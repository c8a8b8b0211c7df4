//! Foundation module - Core utilities and types
//!
//! Fundamental utilities used throughout the capture engine:
//! - Math types and operations
//! - Device/host coordinate-space conversion
//! - Logging utilities

pub mod convert;
pub mod logging;
pub mod math;
