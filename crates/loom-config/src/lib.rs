//! # Loom configuration
//!
//! Typed configuration for the Loom runtime crates, loaded from TOML or
//! JSON, plus the tracing subscriber setup shared by hosts and tests.
//!
//! ```rust,no_run
//! use loom_config::{init_logging, ConfigLoader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::load_from_file("loom.toml").await?;
//!     init_logging(&config.logging)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod loader;
mod logging;

pub use config::*;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use logging::{filter_directives, init_logging};
