use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{DEFAULT_PRIVATE_KEY_ENTRY, DEFAULT_PUBLIC_KEY_ENTRY};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Base configuration used by the CipherTalk client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CipherConfig {
    /// Username written into the `sender` field of outgoing frames.
    pub username: Option<String>,
    /// Path of the durable settings file holding the identity key pair.
    pub settings_path: String,
    /// Settings entry holding the encoded private key.
    pub private_key_entry: String,
    /// Settings entry holding the encoded public key.
    pub public_key_entry: String,
    /// Whether outgoing chat messages are encrypted.
    pub encryption_enabled: bool,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            username: None,
            settings_path: "./data/ciphertalk-settings.json".into(),
            private_key_entry: DEFAULT_PRIVATE_KEY_ENTRY.into(),
            public_key_entry: DEFAULT_PUBLIC_KEY_ENTRY.into(),
            encryption_enabled: false,
        }
    }
}

impl CipherConfig {
    /// Read a JSON config file; absent fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Override the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Override the settings file path.
    pub fn with_settings_path(mut self, path: impl Into<String>) -> Self {
        self.settings_path = path.into();
        self
    }

    /// Override the entry names the identity key halves are stored under.
    pub fn with_key_entries(
        mut self,
        private_entry: impl Into<String>,
        public_entry: impl Into<String>,
    ) -> Self {
        self.private_key_entry = private_entry.into();
        self.public_key_entry = public_entry.into();
        self
    }

    /// Start with encryption on or off.
    pub fn with_encryption(mut self, enabled: bool) -> Self {
        self.encryption_enabled = enabled;
        self
    }
}
