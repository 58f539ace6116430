pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod models;
pub mod service;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};
