use std::collections::BTreeMap;
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Arbitrary key/value configuration for one service.
pub type ServiceConfig = Map<String, Value>;

/// Declarative provisioning input: one KV area per top-level key, one secret
/// per service underneath. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub infrastructure: BTreeMap<String, BTreeMap<String, ServiceConfig>>,
}

impl Settings {
    /// Loads and validates the infrastructure config (YAML or JSON, by file
    /// extension). Malformed entries are rejected here rather than surfacing
    /// mid-provisioning.
    ///
    /// # Errors
    /// Returns `ConfigNotFound` if the file is missing and `ConfigParse` if
    /// it cannot be parsed into the expected area/service shape.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let settings = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Self>()?;
        Ok(settings)
    }
}
