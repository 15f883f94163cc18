//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::http::headers::MappingType;

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Inbound HTTP listener.
    pub listener: ListenerConfig,

    /// Shared dispatch worker pool.
    pub workers: WorkerConfig,

    /// Outbound HTTP client settings, passed through to the transport.
    pub client: ClientConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Pipelines to start.
    pub pipelines: Vec<PipelineConfig>,
}

/// Inbound listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8280").
    pub bind_address: String,

    /// How long an inbound request waits for its reply before 504.
    pub response_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8280".to_string(),
            response_timeout_secs: 60,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of dispatch workers running at once.
    pub pool_size: usize,

    /// Upper bound for a single payload read.
    pub max_payload_bytes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: 5,
            max_payload_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Outbound client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Deadline in seconds for the whole exchange, response body included.
    pub request_timeout_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle connections kept per host.
    pub pool_max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A named pipeline and its elements.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Pipeline name; owner of every listener its elements register.
    pub name: String,

    #[serde(default)]
    pub elements: Vec<ElementConfig>,
}

/// One configured sink or source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ElementConfig {
    HttpRequestSink(RequestSinkConfig),
    HttpResponseSink(ResponseSinkConfig),
    HttpRequestSource(RequestSourceConfig),
    HttpResponseSource(ResponseSourceConfig),
}

impl ElementConfig {
    /// The owner id the element registers or publishes under.
    pub fn owner_id(&self) -> &str {
        match self {
            ElementConfig::HttpRequestSink(c) => &c.sink_id,
            ElementConfig::HttpResponseSink(c) => &c.source_id,
            ElementConfig::HttpRequestSource(c) => &c.source_id,
            ElementConfig::HttpResponseSource(c) => &c.sink_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ElementConfig::HttpRequestSink(_) => "http-request-sink",
            ElementConfig::HttpResponseSink(_) => "http-response-sink",
            ElementConfig::HttpRequestSource(_) => "http-request-source",
            ElementConfig::HttpResponseSource(_) => "http-response-source",
        }
    }
}

/// Publishes events as HTTP requests and correlates the responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestSinkConfig {
    /// Correlates this sink with its response sources.
    pub sink_id: String,

    /// Destination URL; may contain `{{attribute}}` placeholders.
    pub publisher_url: String,

    /// HTTP method (default: POST).
    #[serde(default)]
    pub method: Option<String>,

    /// Headers as `'name:value','name2:value2'`; may contain placeholders.
    #[serde(default)]
    pub headers: String,

    /// Payload mapping type, used to default the content type.
    #[serde(default)]
    pub map: Option<MappingType>,

    /// Stream attributes propagated as transport metadata, in order.
    #[serde(default)]
    pub attributes: Vec<String>,

    /// Write response bodies to `download_path` instead of emitting them.
    #[serde(default)]
    pub download_enabled: bool,

    /// Destination file; mandatory when downloading. May contain placeholders.
    #[serde(default)]
    pub download_path: Option<String>,
}

/// Replies to a waiting inbound request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseSinkConfig {
    /// Id of the request source whose request is answered.
    pub source_id: String,

    /// Message id template, e.g. `{{messageId}}`.
    #[serde(default = "default_message_id")]
    pub message_id: String,

    /// Headers as `'name:value','name2:value2'`; may contain placeholders.
    #[serde(default)]
    pub headers: String,

    #[serde(default)]
    pub map: Option<MappingType>,

    /// Reply status code.
    #[serde(default = "default_status_code")]
    pub status_code: u16,
}

fn default_message_id() -> String {
    "{{message.id}}".to_string()
}

fn default_status_code() -> u16 {
    200
}

/// Receives inbound HTTP requests that expect a reply.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestSourceConfig {
    /// Correlates this source with its response sinks.
    pub source_id: String,

    /// Path served on the inbound listener (e.g., "/orders").
    pub path: String,

    /// Transport attributes extracted per request, in order.
    #[serde(default)]
    pub attributes: Vec<String>,
}

/// Receives the responses of a request sink.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseSourceConfig {
    /// Id of the request sink whose responses are consumed.
    pub sink_id: String,

    /// Only consume responses with this status; all statuses when absent.
    #[serde(default)]
    pub http_status_code: Option<u16>,

    /// Expect downloaded file paths rather than payloads.
    #[serde(default)]
    pub download_enabled: bool,
}
