//! Standalone supervisor host for the DevTools attach plugin.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod inspector;
pub mod logging;
