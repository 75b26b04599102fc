//! Exception configuration

mod loader;

pub use loader::{Config, DEFAULT_CONFIG_NAMES};
