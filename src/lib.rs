//! Splitpack library
//!
//! Core functionality for the Splitpack asset pipeline: module graph
//! construction, chunk splitting, content-hashed manifests and runtime
//! environment injection.

pub mod bundler;
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod html;
pub mod resolver;
pub mod server;
pub mod transform;
pub mod utils;

pub use bundler::{BuildOutput, Bundler};
pub use cli::Cli;
pub use config::Config;
pub use env::{EnvKey, EnvSnapshot};
pub use error::{BuildError, BuildResult};
