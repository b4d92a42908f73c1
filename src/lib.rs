pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod policy;

pub use error::{Error, Result};
