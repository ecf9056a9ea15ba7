//! Server module for Flow Manager
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `init`: Orchestrator wiring, router assembly and the run loop

pub mod config;
mod init;
mod loader;

pub use init::{build_app, build_orchestrator, run};
pub use loader::load_config;
