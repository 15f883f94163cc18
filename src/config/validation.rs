//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject duplicate owner ids and inbound paths across the whole config
//! - Enforce mandatory parameters (ids, URLs, download path)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::schema::{BridgeConfig, ElementConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("workers.pool_size must be greater than 0")]
    ZeroPoolSize,

    #[error("pipeline name must not be empty")]
    EmptyPipelineName,

    #[error("duplicate pipeline name '{0}'")]
    DuplicatePipeline(String),

    #[error("{kind} in pipeline '{pipeline}' is missing its id")]
    MissingId { pipeline: String, kind: &'static str },

    #[error("{kind} id '{id}' is declared more than once")]
    DuplicateId { kind: &'static str, id: String },

    #[error("sink '{sink_id}' has invalid publisher_url '{url}'")]
    InvalidUrl { sink_id: String, url: String },

    #[error("sink '{0}' enables downloading without a download_path")]
    MissingDownloadPath(String),

    #[error("source '{source_id}' path '{path}' must start with '/'")]
    InvalidPath { source_id: String, path: String },

    #[error("inbound path '{0}' is served by more than one source")]
    DuplicatePath(String),
}

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.workers.pool_size == 0 {
        errors.push(ValidationError::ZeroPoolSize);
    }

    let mut pipelines = HashSet::new();
    // Registration namespaces: (kind, id, refinement).
    let mut owners: HashSet<(&'static str, String, Option<u16>)> = HashSet::new();
    let mut paths = HashSet::new();

    for pipeline in &config.pipelines {
        if pipeline.name.trim().is_empty() {
            errors.push(ValidationError::EmptyPipelineName);
        } else if !pipelines.insert(pipeline.name.as_str()) {
            errors.push(ValidationError::DuplicatePipeline(pipeline.name.clone()));
        }

        for element in &pipeline.elements {
            if element.owner_id().trim().is_empty() {
                errors.push(ValidationError::MissingId {
                    pipeline: pipeline.name.clone(),
                    kind: element.kind(),
                });
                continue;
            }

            match element {
                ElementConfig::HttpRequestSink(sink) => {
                    if !sink.publisher_url.contains("{{") && Url::parse(&sink.publisher_url).is_err() {
                        errors.push(ValidationError::InvalidUrl {
                            sink_id: sink.sink_id.clone(),
                            url: sink.publisher_url.clone(),
                        });
                    }
                    let has_path = sink
                        .download_path
                        .as_deref()
                        .is_some_and(|p| !p.trim().is_empty());
                    if sink.download_enabled && !has_path {
                        errors.push(ValidationError::MissingDownloadPath(sink.sink_id.clone()));
                    }
                    if !owners.insert((element.kind(), sink.sink_id.clone(), None)) {
                        errors.push(ValidationError::DuplicateId {
                            kind: element.kind(),
                            id: sink.sink_id.clone(),
                        });
                    }
                }
                ElementConfig::HttpRequestSource(source) => {
                    if !source.path.starts_with('/') {
                        errors.push(ValidationError::InvalidPath {
                            source_id: source.source_id.clone(),
                            path: source.path.clone(),
                        });
                    } else if !paths.insert(source.path.as_str()) {
                        errors.push(ValidationError::DuplicatePath(source.path.clone()));
                    }
                    if !owners.insert((element.kind(), source.source_id.clone(), None)) {
                        errors.push(ValidationError::DuplicateId {
                            kind: element.kind(),
                            id: source.source_id.clone(),
                        });
                    }
                }
                ElementConfig::HttpResponseSource(source) => {
                    let key = (element.kind(), source.sink_id.clone(), source.http_status_code);
                    if !owners.insert(key) {
                        errors.push(ValidationError::DuplicateId {
                            kind: element.kind(),
                            id: source.sink_id.clone(),
                        });
                    }
                }
                // Several response sinks may answer the same source.
                ElementConfig::HttpResponseSink(_) => {}
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
