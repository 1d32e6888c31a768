//! Decoded Aura response payloads (read-only).
//!
//! Responses arrive as `while(1);` followed by a JSON superset: the server
//! routinely emits live function literals as object values. Parsing never
//! throws the response away. A payload that is not JSON degrades to
//! [`ParsedResponse::RawFallback`], which keeps the exact body text and, where
//! the `actions` array can still be split out, the per-action records that do
//! parse.
//!
//! Responses are inspected only; nothing here writes them back to the wire.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::codec::{parse_json, pretty_print};
use crate::config::AURA_RESPONSE_START;
use crate::error::{AuraError, Result};
use crate::request::ACTIONS_KEY;

/// Marker some error responses append after the payload.
const ERROR_SUFFIX: &str = "/*ERROR*/";

/// Comment close some error responses put before the payload.
const ERROR_PREFIX: &str = "*/";

static ACTIONS_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""actions"\s*:\s*\["#).expect("Invalid regex pattern"));

// =============================================================================
// ActionResponse
// =============================================================================

/// Result payload of one action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    /// The action object parsed as JSON.
    Parsed(Value),
    /// The action's source text, which is not valid JSON.
    Raw(String),
}

/// One action's result record.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponse {
    id: String,
    state: Option<String>,
    result: ActionResult,
}

impl ActionResponse {
    /// Builds a record from a parsed action object. Returns `None` when the
    /// object has no string id.
    pub fn from_value(value: Value) -> Option<Self> {
        let id = value.get("id")?.as_str()?.to_string();
        let state = value
            .get("state")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Self {
            id,
            state,
            result: ActionResult::Parsed(value),
        })
    }

    /// Builds a record for an action whose text did not parse.
    pub fn raw(id: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: None,
            result: ActionResult::Raw(fragment.into()),
        }
    }

    /// The action id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The reported state (`SUCCESS`, `ERROR`, ...), if any.
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// The result payload.
    pub fn result(&self) -> &ActionResult {
        &self.result
    }

    /// The action's `returnValue`, if it parsed and has one.
    pub fn return_value(&self) -> Option<&Value> {
        match &self.result {
            ActionResult::Parsed(value) => value.get("returnValue"),
            ActionResult::Raw(_) => None,
        }
    }

    /// The action's `error` list; empty when absent or unparsed.
    pub fn errors(&self) -> &[Value] {
        match &self.result {
            ActionResult::Parsed(value) => value
                .get("error")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            ActionResult::Raw(_) => &[],
        }
    }

    /// Checks if the record only holds unparsed text.
    pub fn is_raw(&self) -> bool {
        matches!(self.result, ActionResult::Raw(_))
    }

    /// Display text: pretty JSON, or the raw fragment.
    pub fn to_pretty_string(&self) -> String {
        match &self.result {
            ActionResult::Parsed(value) => {
                pretty_print(value).unwrap_or_else(|_| value.to_string())
            }
            ActionResult::Raw(text) => text.clone(),
        }
    }
}

// =============================================================================
// AuraResponseMessage
// =============================================================================

/// A response payload that parsed as JSON.
#[derive(Debug, Clone)]
pub struct AuraResponseMessage {
    payload: Value,
    actions: Vec<ActionResponse>,
    index: HashMap<String, usize>,
}

/// Response that could not be parsed as a whole.
#[derive(Debug)]
pub struct RawResponse {
    /// The body text exactly as given to [`AuraResponseMessage::parse`].
    pub text: String,
    /// Why the payload did not parse.
    pub error: AuraError,
    /// Action records recovered from the `actions` array, if any.
    pub salvaged: Vec<ActionResponse>,
}

/// Outcome of parsing a response body.
#[derive(Debug)]
pub enum ParsedResponse {
    /// The payload parsed.
    Message(AuraResponseMessage),
    /// The payload is not JSON; show it read-only.
    RawFallback(RawResponse),
}

impl ParsedResponse {
    /// Checks if parsing fell back to raw text.
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::RawFallback(_))
    }

    /// The parsed message, if parsing succeeded.
    pub fn message(&self) -> Option<&AuraResponseMessage> {
        match self {
            Self::Message(message) => Some(message),
            Self::RawFallback(_) => None,
        }
    }

    /// The raw fallback, if parsing failed.
    pub fn raw(&self) -> Option<&RawResponse> {
        match self {
            Self::Message(_) => None,
            Self::RawFallback(raw) => Some(raw),
        }
    }

    /// Action records, parsed or salvaged.
    pub fn actions(&self) -> &[ActionResponse] {
        match self {
            Self::Message(message) => &message.actions,
            Self::RawFallback(raw) => &raw.salvaged,
        }
    }
}

impl AuraResponseMessage {
    /// Parses a response body, starting at the body offset.
    pub fn parse(body: &str) -> ParsedResponse {
        let payload = strip_guard(body);

        match parse_json(payload) {
            Ok(value) => ParsedResponse::Message(Self::from_value(value)),
            Err(error) => {
                tracing::warn!("Response is not valid JSON, showing raw text: {}", error);
                let salvaged = salvage_actions(payload);
                if !salvaged.is_empty() {
                    tracing::debug!("Salvaged {} actions from raw response", salvaged.len());
                }
                ParsedResponse::RawFallback(RawResponse {
                    text: body.to_string(),
                    error,
                    salvaged,
                })
            }
        }
    }

    /// Builds a message from a parsed payload. Actions without an id are
    /// skipped, and a repeated id keeps its first record.
    pub fn from_value(payload: Value) -> Self {
        let mut actions = Vec::new();
        let mut index = HashMap::new();

        if let Some(list) = payload.get(ACTIONS_KEY).and_then(Value::as_array) {
            for item in list {
                match ActionResponse::from_value(item.clone()) {
                    Some(action) if index.contains_key(&action.id) => {
                        tracing::debug!("Skipping duplicate response action {}", action.id);
                    }
                    Some(action) => {
                        index.insert(action.id.clone(), actions.len());
                        actions.push(action);
                    }
                    None => tracing::debug!("Skipping response action without id"),
                }
            }
        }

        Self {
            payload,
            actions,
            index,
        }
    }

    /// Looks up an action record by id.
    pub fn action(&self, id: &str) -> Result<&ActionResponse> {
        self.index
            .get(id)
            .map(|&i| &self.actions[i])
            .ok_or_else(|| AuraError::ActionNotFound { id: id.to_string() })
    }

    /// Action records in source order.
    pub fn actions(&self) -> &[ActionResponse] {
        &self.actions
    }

    /// Action ids in source order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(ActionResponse::id)
    }

    /// Number of action records.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Checks if there are no action records.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// A top-level payload field (`context`, `perfSummary`, ...).
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// The whole parsed payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

/// Strips the `while(1)` guard, an optional `;`, and the comment markers
/// error responses wrap around the payload.
pub fn strip_guard(body: &str) -> &str {
    let rest = body.strip_prefix(AURA_RESPONSE_START).unwrap_or(body);
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(';').unwrap_or(rest).trim_start();
    let rest = rest.strip_prefix(ERROR_PREFIX).unwrap_or(rest).trim();
    rest.strip_suffix(ERROR_SUFFIX).unwrap_or(rest).trim_end()
}

// =============================================================================
// Salvage
// =============================================================================

/// Recovers per-action records from a payload that does not parse as a whole.
fn salvage_actions(payload: &str) -> Vec<ActionResponse> {
    let Some(start) = ACTIONS_START_RE.find(payload) else {
        return Vec::new();
    };

    split_array_elements(&payload[start.end()..])
        .into_iter()
        .filter_map(|fragment| match serde_json::from_str::<Value>(fragment) {
            Ok(value) => ActionResponse::from_value(value),
            Err(_) => fragment_id(fragment).map(|id| ActionResponse::raw(id, fragment)),
        })
        .collect()
}

/// Splits the text following an array's `[` into top-level element slices.
///
/// String-aware and bracket-balanced, treating parentheses as brackets so
/// function literals stay inside their element. An unterminated array yields
/// only the elements that were closed.
fn split_array_elements(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut elements = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                i = string_end(bytes, i, quote);
                continue;
            }
            b'{' | b'[' | b'(' => depth += 1,
            b']' if depth == 0 => {
                push_element(&mut elements, &text[start..i]);
                return elements;
            }
            b'}' | b']' | b')' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                push_element(&mut elements, &text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    elements
}

/// Index just past the string literal opening at `open`, or the end of the
/// input when the literal is unterminated.
fn string_end(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn push_element<'a>(elements: &mut Vec<&'a str>, slice: &'a str) {
    let slice = slice.trim();
    if !slice.is_empty() {
        elements.push(slice);
    }
}

/// Reads the `id` of an unparsed action object from its top-level keys,
/// ignoring ids nested in `returnValue` and friends.
fn fragment_id(fragment: &str) -> Option<String> {
    let bytes = fragment.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                let end = string_end(bytes, i, quote);
                if depth == 1 && &fragment[i..end] == "\"id\"" {
                    if let Some(value) = fragment[end..].trim_start().strip_prefix(':') {
                        return string_value(value.trim_start());
                    }
                }
                i = end;
                continue;
            }
            b'{' | b'[' | b'(' => depth += 1,
            b'}' | b']' | b')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Unescapes the JSON string literal at the start of `text`.
fn string_value(text: &str) -> Option<String> {
    if !text.starts_with('"') {
        return None;
    }
    let end = string_end(text.as_bytes(), 0, b'"');
    serde_json::from_str(&text[..end]).ok()
}
