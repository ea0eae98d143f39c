use std::collections::HashSet;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// A statically configured mount: every path starting with `prefix` is
/// served by a secrets engine of type `kind` (`"kv"`, `"database"`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MountConfig {
    pub prefix: String,
    pub kind: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BackendConfig {
    /// Static mount table
    #[serde(default)]
    pub mounts: Vec<MountConfig>,

    /// Mount prefixes skipped during discovery (system mounts)
    #[serde(default = "default_ignored_prefixes")]
    pub ignored_prefixes: Vec<String>,
}

fn default_ignored_prefixes() -> Vec<String> {
    vec!["sys/".into(), "cubbyhole/".into(), "identity/".into()]
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mounts: Vec::new(),
            ignored_prefixes: default_ignored_prefixes(),
        }
    }
}

impl BackendConfig {
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for mount in &self.mounts {
            if mount.prefix.len() < 2 || !mount.prefix.ends_with('/') {
                return Err(Error::Config(ConfigError::Message(format!(
                    "mount prefix must be non-empty and end with '/', got {:?}",
                    mount.prefix
                ))));
            }
            if !seen.insert(mount.prefix.as_str()) {
                return Err(Error::Config(ConfigError::Message(format!(
                    "duplicate mount prefix {:?}",
                    mount.prefix
                ))));
            }
        }
        Ok(())
    }
}
