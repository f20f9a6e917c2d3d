//! wirefetch command-line library.
//!
//! This crate holds everything behind the `wirefetch` binary so it can be
//! exercised without spawning a process.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`commands`] - Command implementations over the `wirefetch` library
//! - [`dirs`] - Platform configuration directory lookup
//! - [`output`] - Error, table, and JSON rendering
//! - [`progress`] - Download progress lines and byte formatting

pub mod cli;
pub mod commands;
pub mod dirs;
pub mod output;
pub mod progress;
