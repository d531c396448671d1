//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the render core:
//! - Math types and view-space helpers
//! - Logging setup

pub mod math;
pub mod logging;
