//! Session configuration.
//!
//! The protocol constants are fixed; the config only lets a caller point a
//! session at a site-specific payload parameter and give it a label.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Body parameter whose presence marks a request as Aura traffic.
pub const AURA_INDICATOR: &str = "aura.token";

/// Default body parameter carrying the URL-encoded action batch.
pub const AURA_DATAPARAM: &str = "message";

/// Path substring every Aura endpoint contains.
pub const AURA_ENDPOINT_MARKER: &str = "/aura";

/// Anti-hijacking guard that prefixes every Aura JSON response.
pub const AURA_RESPONSE_START: &str = "while(1)";

/// Stated MIME label a response must carry to be considered.
pub const JSON_MIME_TYPE: &str = "JSON";

/// Default session label.
pub const DEFAULT_LABEL: &str = "Aura Actions";

/// Configuration for an Aura editing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuraConfig {
    /// Body parameter carrying the action batch.
    pub payload_param: String,
    /// Body parameter marking a request as Aura traffic.
    pub indicator_param: String,
    /// Substring an endpoint path must contain.
    pub endpoint_marker: String,
    /// Caption used in notices and logs.
    pub label: String,
}

impl Default for AuraConfig {
    fn default() -> Self {
        Self {
            payload_param: AURA_DATAPARAM.to_string(),
            indicator_param: AURA_INDICATOR.to_string(),
            endpoint_marker: AURA_ENDPOINT_MARKER.to_string(),
            label: DEFAULT_LABEL.to_string(),
        }
    }
}

impl AuraConfig {
    /// Creates a config with the protocol defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the payload parameter name.
    pub fn with_payload_param(mut self, name: impl Into<String>) -> Self {
        self.payload_param = name.into();
        self
    }

    /// Sets the session label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Loads a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parses a config from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| crate::AuraError::MalformedJson {
            fallback: text.to_string(),
            source,
        })
    }
}
