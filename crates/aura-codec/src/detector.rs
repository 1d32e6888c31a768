//! Aura traffic detection.
//!
//! Cheap syntactic gates deciding whether a message is worth decoding. None
//! of these parse JSON and none of them fail: anything ambiguous is simply
//! not Aura.

use crate::config::{AuraConfig, AURA_ENDPOINT_MARKER, AURA_RESPONSE_START, JSON_MIME_TYPE};
use crate::wire::WireAdapter;

/// Checks if a request is Aura traffic.
///
/// The indicator parameter must be present. When the endpoint path is known
/// it must also contain the endpoint marker; when it is not known the path
/// check is skipped.
pub fn is_aura_request<A: WireAdapter + ?Sized>(
    adapter: &A,
    content: &[u8],
    endpoint_path: Option<&str>,
) -> bool {
    is_aura_request_with(adapter, content, endpoint_path, &AuraConfig::default())
}

/// [`is_aura_request`] with the indicator and endpoint marker taken from a
/// config.
pub fn is_aura_request_with<A: WireAdapter + ?Sized>(
    adapter: &A,
    content: &[u8],
    endpoint_path: Option<&str>,
    config: &AuraConfig,
) -> bool {
    if content.is_empty() {
        return false;
    }

    let has_indicator = adapter
        .request_parameter(content, &config.indicator_param)
        .is_some();
    if !has_indicator {
        return false;
    }

    match endpoint_path {
        Some(path) => path.contains(config.endpoint_marker.as_str()),
        None => true,
    }
}

/// Checks if a response is Aura traffic from its stated MIME label and body.
///
/// Only compares up to the available length, so short bodies are rejected
/// rather than read out of bounds.
pub fn is_aura_response(content: &[u8], stated_mime_type: &str, body: &[u8]) -> bool {
    !content.is_empty() && stated_mime_type == JSON_MIME_TYPE && has_guard_prefix(body)
}

/// Runs [`is_aura_response`] on a raw response, letting the adapter find the
/// MIME label and body.
pub fn detect_response<A: WireAdapter + ?Sized>(adapter: &A, content: &[u8]) -> bool {
    if content.is_empty() {
        return false;
    }
    let info = adapter.analyze_response(content);
    let body = content.get(info.body_offset..).unwrap_or_default();
    is_aura_response(content, &info.stated_mime_type, body)
}

/// Checks if a body starts with the `while(1)` guard.
pub fn has_guard_prefix(body: &[u8]) -> bool {
    body.starts_with(AURA_RESPONSE_START.as_bytes())
}

/// Checks an endpoint path against the default endpoint marker.
pub fn is_aura_endpoint(path: &str) -> bool {
    path.contains(AURA_ENDPOINT_MARKER)
}
