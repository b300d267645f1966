//! Command implementations for the CLI
//!
//! - start: Start the proxy server
//! - test: Check configuration and database
//! - config: Configuration display and validation

pub mod config;
pub mod start;
