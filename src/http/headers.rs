//! Header list parsing and content-type policy.
//!
//! # Responsibilities
//! - Parse `'name:value','name2:value2'` header lists
//! - Default the content type from the payload mapping type
//! - Compute Content-Length from the encoded body
//!
//! # Design Decisions
//! - A caller-supplied content-type is used verbatim
//! - Caller-supplied Content-Length is always replaced

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Payload mapping declared on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingType {
    Text,
    Xml,
    Json,
    #[serde(alias = "key-value")]
    Keyvalue,
}

impl MappingType {
    /// Content type used when no content-type header is supplied.
    pub fn default_content_type(self) -> &'static str {
        match self {
            MappingType::Text => "plain/text",
            MappingType::Xml => "application/xml",
            MappingType::Json => "application/json",
            MappingType::Keyvalue => "application/x-www-form-urlencoded",
        }
    }
}

/// A single configured header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parse a header list such as `'content-type:json','x-id:7'`.
///
/// Blank input yields no headers. Each entry splits on its first `:`.
pub fn parse_headers(raw: &str) -> BridgeResult<Vec<Header>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let inner = trimmed.strip_prefix('\'').unwrap_or(trimmed);
    let inner = inner.strip_suffix('\'').unwrap_or(inner);

    let mut headers = Vec::new();
    for entry in inner.split("','") {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                headers.push(Header::new(name.trim(), value.trim()));
            }
            _ => {
                return Err(BridgeError::Configuration(format!(
                    "Invalid header format '{}', expected 'name:value'",
                    entry
                )))
            }
        }
    }
    Ok(headers)
}

/// Content type for a message: explicit header first, then the mapping default.
pub fn content_type(mapping: Option<MappingType>, headers: &[Header]) -> String {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
        .map(|h| h.value.clone())
        .unwrap_or_else(|| {
            mapping
                .unwrap_or(MappingType::Text)
                .default_content_type()
                .to_string()
        })
}

/// Build the final header map for a body of `body_len` bytes.
pub fn build_header_map(
    headers: &[Header],
    mapping: Option<MappingType>,
    body_len: usize,
) -> BridgeResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len() + 2);

    for header in headers {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|e| BridgeError::InvalidRequest(format!("header '{}': {}", header.name, e)))?;
        if name == CONTENT_TYPE || name == CONTENT_LENGTH {
            continue;
        }
        let value = HeaderValue::from_str(&header.value)
            .map_err(|e| BridgeError::InvalidRequest(format!("header '{}': {}", header.name, e)))?;
        map.append(name, value);
    }

    let content_type = content_type(mapping, headers);
    let content_type = HeaderValue::from_str(&content_type)
        .map_err(|e| BridgeError::InvalidRequest(format!("content-type: {}", e)))?;
    map.insert(CONTENT_TYPE, content_type);
    map.insert(CONTENT_LENGTH, HeaderValue::from(body_len));

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_list() {
        let headers = parse_headers("'content-type:json','content-length:94'").unwrap();
        assert_eq!(
            headers,
            vec![Header::new("content-type", "json"), Header::new("content-length", "94")]
        );
    }

    #[test]
    fn value_may_contain_colons() {
        let headers = parse_headers("'Location:http://example.com:8080/x'").unwrap();
        assert_eq!(headers[0].value, "http://example.com:8080/x");
    }

    #[test]
    fn blank_and_malformed() {
        assert!(parse_headers("   ").unwrap().is_empty());
        assert!(matches!(
            parse_headers("'novalue'"),
            Err(BridgeError::Configuration(_))
        ));
    }

    #[test]
    fn json_mapping_defaults_content_type() {
        let map = build_header_map(&[], Some(MappingType::Json), 12).unwrap();
        assert_eq!(map[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn explicit_content_type_is_verbatim() {
        let headers = parse_headers("'Content-Type:json'").unwrap();
        let map = build_header_map(&headers, Some(MappingType::Xml), 3).unwrap();
        assert_eq!(map[CONTENT_TYPE], "json");
        assert_eq!(map.get_all(CONTENT_TYPE).iter().count(), 1);
    }

    #[test]
    fn mapping_defaults() {
        assert_eq!(content_type(None, &[]), "plain/text");
        assert_eq!(content_type(Some(MappingType::Text), &[]), "plain/text");
        assert_eq!(content_type(Some(MappingType::Xml), &[]), "application/xml");
        assert_eq!(
            content_type(Some(MappingType::Keyvalue), &[]),
            "application/x-www-form-urlencoded"
        );
    }

    #[test]
    fn content_length_overrides_caller_value() {
        let headers = parse_headers("'content-length:94','x-trace:abc'").unwrap();
        let body = "{\"a\":1}";
        let map = build_header_map(&headers, None, body.len()).unwrap();
        assert_eq!(map[CONTENT_LENGTH], "7");
        assert_eq!(map["x-trace"], "abc");
    }
}
