//! I/O collaborators of the engine.

pub mod config;
pub mod discovery;
pub mod env_files;
pub mod init;
pub mod process;
pub mod prompt;
