//! Transport metadata attached to materialized events.
//!
//! # Responsibilities
//! - Carry the declared stream attributes in declaration order
//! - Append protocol-derived fields (method, host, port, protocol, path, status)
//! - Carry the destination path only when download mode is enabled

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub const HTTP_METHOD: &str = "HTTP_METHOD";
pub const HTTP_HOST: &str = "HTTP_HOST";
pub const HTTP_PORT: &str = "HTTP_PORT";
pub const PROTOCOL: &str = "PROTOCOL";
pub const TO: &str = "TO";
pub const HTTP_STATUS_CODE: &str = "HTTP_STATUS_CODE";
pub const DOWNLOAD_PATH: &str = "download.path";
pub const MESSAGE_ID: &str = "message.id";

/// Protocol-level facts about a request or response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub method: String,
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub path: String,
    pub status: Option<u16>,
}

impl ProtocolInfo {
    /// Derive protocol info from a request URL.
    pub fn from_url(method: &str, url: &Url) -> Self {
        Self {
            method: method.to_string(),
            host: url.host_str().unwrap_or_default().to_string(),
            port: url.port_or_known_default().unwrap_or_default(),
            protocol: url.scheme().to_string(),
            path: url.path().to_string(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Ordered attribute-name to value mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportMetadata {
    entries: IndexMap<String, Value>,
}

impl TransportMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair declared attribute names with event values, in declaration order.
    ///
    /// Missing values are recorded as `null` so every declared attribute is present.
    pub fn from_declared(attributes: &[String], values: &[Value]) -> Self {
        let mut entries = IndexMap::with_capacity(attributes.len());
        for (i, name) in attributes.iter().enumerate() {
            let value = values.get(i).cloned().unwrap_or(Value::Null);
            entries.insert(name.clone(), value);
        }
        Self { entries }
    }

    /// Append protocol-derived fields after the declared attributes.
    pub fn with_protocol(mut self, info: &ProtocolInfo) -> Self {
        self.insert(HTTP_METHOD, info.method.clone());
        self.insert(HTTP_HOST, info.host.clone());
        self.insert(HTTP_PORT, info.port);
        self.insert(PROTOCOL, info.protocol.clone());
        self.insert(TO, info.path.clone());
        if let Some(status) = info.status {
            self.insert(HTTP_STATUS_CODE, status.to_string());
        }
        self
    }

    /// Record the download destination. Only called when download mode is on.
    pub fn with_download_path(mut self, path: impl Into<String>) -> Self {
        self.insert(DOWNLOAD_PATH, path.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// String view of an attribute; numbers and booleans are rendered.
    pub fn get_str(&self, name: &str) -> Option<String> {
        match self.entries.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Attribute names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Restrict the metadata to `attributes`, in that order. Absent names map to `null`.
    pub fn project(&self, attributes: &[String]) -> Self {
        let mut entries = IndexMap::with_capacity(attributes.len());
        for name in attributes {
            let value = self.entries.get(name).cloned().unwrap_or(Value::Null);
            entries.insert(name.clone(), value);
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
