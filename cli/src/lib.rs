//! Shared plumbing for the voxgate command line.
//!
//! Configuration lives in ~/.voxgate/config.yaml (see [`config`]); the
//! embedding store and cluster artifact default to directories beside it
//! (see [`paths`]).

pub mod config;
pub mod output;
pub mod paths;

pub use config::{load_config, save_config, Config};
pub use output::{Output, OutputFormat};
pub use paths::Paths;
