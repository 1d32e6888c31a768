//! The URL-decode / JSON-parse path and its inverse.
//!
//! ```text
//! raw param value ──url_decode──▶ JSON text ──parse──▶ Value ──pretty──▶ display
//!                                                        │
//! raw param value ◀──url_encode── compact JSON ◀─────────┘ (after edits)
//! ```
//!
//! Pretty text is for display only; edits come back as text and are parsed
//! again, never diffed against the pretty form.

use serde_json::Value;

use crate::error::{AuraError, Result};
use crate::wire::WireAdapter;

/// Parses JSON text. On failure the text itself is returned as fallback.
pub fn parse_json(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|source| AuraError::MalformedJson {
        fallback: text.to_string(),
        source,
    })
}

/// Pretty-prints a JSON tree for display.
pub fn pretty_print(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(AuraError::EncodeFailure)
}

/// Compact-serializes a JSON tree.
pub fn compact(value: &Value) -> Result<String> {
    serde_json::to_string(value).map_err(AuraError::EncodeFailure)
}

/// Re-indents JSON text, or returns it unchanged if it does not parse.
pub fn prettify(text: &str) -> String {
    parse_json(text)
        .and_then(|value| pretty_print(&value))
        .unwrap_or_else(|_| text.to_string())
}

/// Codec bound to the adapter providing URL encoding.
#[derive(Debug)]
pub struct Codec<'a, A: WireAdapter + ?Sized> {
    adapter: &'a A,
}

impl<'a, A: WireAdapter + ?Sized> Codec<'a, A> {
    /// Creates a codec over the given adapter.
    pub fn new(adapter: &'a A) -> Self {
        Self { adapter }
    }

    /// URL-decodes a raw parameter value.
    pub fn decode_text(&self, raw: &str) -> String {
        self.adapter.url_decode(raw)
    }

    /// URL-decodes and parses a raw parameter value.
    ///
    /// On parse failure the error carries the URL-decoded text.
    pub fn decode(&self, raw: &str) -> Result<Value> {
        let text = self.decode_text(raw);
        let value = parse_json(&text);
        if let Err(ref e) = value {
            tracing::debug!("Payload did not parse as JSON: {}", e);
        }
        value
    }

    /// Compact-serializes and URL-encodes a JSON tree.
    pub fn encode(&self, value: &Value) -> Result<String> {
        Ok(self.encode_text(&compact(value)?))
    }

    /// URL-encodes already serialized JSON text.
    pub fn encode_text(&self, text: &str) -> String {
        self.adapter.url_encode(text)
    }

    /// Decodes a raw parameter value into display text: pretty JSON when it
    /// parses, otherwise the URL-decoded text.
    pub fn display_text(&self, raw: &str) -> String {
        match self.decode(raw) {
            Ok(value) => pretty_print(&value).unwrap_or_else(|e| {
                tracing::warn!("Failed to pretty-print payload: {}", e);
                self.decode_text(raw)
            }),
            Err(e) => e
                .fallback_text()
                .map(str::to_string)
                .unwrap_or_else(|| self.decode_text(raw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{url_encode, RawHttpAdapter};

    const PAYLOAD: &str = r#"{"actions":[{"id":"12;a","descriptor":"apex://AccountController/ACTION$list","callingDescriptor":"UNKNOWN","params":{"limit":10,"filter":"name = 'x'"}}]}"#;

    #[test]
    fn decode_parses_url_encoded_json() {
        let adapter = RawHttpAdapter::new();
        let codec = Codec::new(&adapter);
        let value = codec.decode(&url_encode(PAYLOAD)).unwrap();
        assert_eq!(value["actions"][0]["id"], "12;a");
        assert_eq!(value["actions"][0]["params"]["limit"], 10);
    }

    #[test]
    fn decode_failure_carries_decoded_text() {
        let adapter = RawHttpAdapter::new();
        let codec = Codec::new(&adapter);
        let err = codec.decode("%7Bnot+json").unwrap_err();
        assert!(matches!(err, AuraError::MalformedJson { .. }));
        assert_eq!(err.fallback_text(), Some("{not json"));
    }

    #[test]
    fn encode_is_inverse_of_decode() {
        let adapter = RawHttpAdapter::new();
        let codec = Codec::new(&adapter);
        let raw = url_encode(PAYLOAD);
        let value = codec.decode(&raw).unwrap();
        assert_eq!(codec.encode(&value).unwrap(), raw);
    }

    #[test]
    fn key_order_survives_round_trip() {
        let text = r#"{"z":1,"a":2,"m":{"y":true,"b":null}}"#;
        let value = parse_json(text).unwrap();
        assert_eq!(compact(&value).unwrap(), text);
    }

    #[test]
    fn number_text_survives_round_trip() {
        let text = r#"{"price":1.50,"big":123456789012345678901234567890}"#;
        let value = parse_json(text).unwrap();
        assert_eq!(compact(&value).unwrap(), text);
    }

    #[test]
    fn pretty_print_indents() {
        let value = parse_json(r#"{"a":[1,2]}"#).unwrap();
        let pretty = pretty_print(&value).unwrap();
        assert_eq!(pretty, "{\n  \"a\": [\n    1,\n    2\n  ]\n}");
    }

    #[test]
    fn prettify_passes_through_invalid_text() {
        assert_eq!(prettify("{oops"), "{oops");
        assert_eq!(prettify(r#"{"a":1}"#), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn display_text_falls_back_to_decoded_text() {
        let adapter = RawHttpAdapter::new();
        let codec = Codec::new(&adapter);
        assert_eq!(codec.display_text("%7B%22a%22%3A1%7D"), "{\n  \"a\": 1\n}");
        assert_eq!(codec.display_text("a%3Db"), "a=b");
    }
}
