//! # Taskboard Library
//!
//! This library exposes the Taskboard server and CLI for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cli;
pub mod config;

// Re-export taskboard_core for convenience
pub use taskboard_core;
