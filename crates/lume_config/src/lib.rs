//! # lume_config
//!
//! Settings loading for the Lume site infrastructure.
//!
//! A settings file holds a shared stack name and one section per deployment
//! environment. Each section resolves into an immutable
//! [`EnvironmentConfig`]; any missing field is a load failure.
//!
//! ## Example
//!
//! ```rust,no_run
//! use lume_config::{Settings, DEFAULT_ENVIRONMENTS};
//!
//! let settings = Settings::from_file("config/config.yaml").unwrap();
//! for env in settings.environments(&DEFAULT_ENVIRONMENTS).unwrap() {
//!     println!("{} -> deploy={}", env.name, env.is_deploy);
//! }
//! ```

pub mod environment;
pub mod error;
pub mod settings;

pub use environment::EnvironmentConfig;
pub use error::{ConfigError, ConfigResult};
pub use settings::{Settings, DEFAULT_ENVIRONMENTS};
