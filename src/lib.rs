//! blmctl: fleet console for beam-loss monitor nodes.
//!
//! This library exposes the core modules for use by the binary and by tests.

pub mod model;
pub mod config;
pub mod logging;
pub mod ssh;
pub mod commands;
pub mod registry;
pub mod classifier;
pub mod tracker;
pub mod ui;
pub mod pool;
pub mod poller;
pub mod executor;
pub mod batch;
pub mod deploy;
pub mod node_config;
pub mod node_table;
pub mod view;
pub mod app;
