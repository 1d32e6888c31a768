//! Editing sessions over raw HTTP messages.
//!
//! A session takes the bytes of one intercepted message, decodes it, lets the
//! caller edit the decoded form, and hands back bytes with only the payload
//! parameter patched. Two flavours:
//!
//! - [`ActionsEditor`]: per-action editing of requests, read-only inspection
//!   of responses.
//! - [`JsonEditor`]: the whole request payload as one pretty-printed JSON
//!   text, for edits that go beyond controller/method/params.
//!
//! Neither session renders anything; the caller owns presentation and
//! surfaces [`Rebuilt::notice`] as a non-blocking message.

use crate::codec::{parse_json, Codec};
use crate::config::AuraConfig;
use crate::detector::{detect_response, is_aura_request_with};
use crate::error::AuraError;
use crate::request::{ActionEdit, AuraRequestMessage, EditReport};
use crate::response::{AuraResponseMessage, ParsedResponse};
use crate::wire::{Parameter, ParameterLocation, WireAdapter};

/// Notice shown when edited text is not valid JSON.
pub const INVALID_JSON_NOTICE: &str = "Invalid JSON entered, using original payload";

fn unwritable_notice(label: &str) -> String {
    format!("Could not write {} payload into the message, using original", label)
}

/// Bytes produced by a session, plus a notice for the user if something was
/// dropped along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebuilt {
    pub message: Vec<u8>,
    pub notice: Option<String>,
}

impl Rebuilt {
    fn unchanged(content: &[u8]) -> Self {
        Self {
            message: content.to_vec(),
            notice: None,
        }
    }

    fn with_notice(content: &[u8], notice: impl Into<String>) -> Self {
        Self {
            message: content.to_vec(),
            notice: Some(notice.into()),
        }
    }
}

/// What an [`ActionsEditor`] currently holds.
#[derive(Debug, Default)]
pub enum SessionState {
    /// Nothing loaded.
    #[default]
    Empty,
    /// A decoded request.
    Request(AuraRequestMessage),
    /// A parsed (or raw-fallback) response.
    Response(ParsedResponse),
    /// A request whose payload could not be decoded; `text` is displayable.
    Undecodable { text: String, error: AuraError },
}

fn request_is_enabled<A: WireAdapter>(
    adapter: &A,
    config: &AuraConfig,
    endpoint_context: bool,
    content: &[u8],
) -> bool {
    // An unreadable request line leaves the endpoint unknown, which skips the
    // path check.
    let path = endpoint_context
        .then(|| adapter.request_path(content))
        .flatten();
    is_aura_request_with(adapter, content, path.as_deref(), config)
}

// =============================================================================
// ActionsEditor
// =============================================================================

/// Per-action editing session.
#[derive(Debug)]
pub struct ActionsEditor<A: WireAdapter> {
    adapter: A,
    config: AuraConfig,
    endpoint_context: bool,
    editable: bool,
    content: Vec<u8>,
    payload: Option<Parameter>,
    state: SessionState,
    modified: bool,
}

impl<A: WireAdapter> ActionsEditor<A> {
    /// Creates an editable session that checks endpoint paths.
    pub fn new(adapter: A, config: AuraConfig) -> Self {
        Self {
            adapter,
            config,
            endpoint_context: true,
            editable: true,
            content: Vec::new(),
            payload: None,
            state: SessionState::Empty,
            modified: false,
        }
    }

    /// Sets whether the endpoint path is known. Without it, the indicator
    /// parameter alone admits a request.
    pub fn with_endpoint_context(mut self, known: bool) -> Self {
        self.endpoint_context = known;
        self
    }

    /// Sets whether edits are written back.
    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// The session config.
    pub fn config(&self) -> &AuraConfig {
        &self.config
    }

    /// Checks if this session applies to a message.
    pub fn is_enabled(&self, content: &[u8], is_request: bool) -> bool {
        if content.is_empty() {
            return false;
        }
        if is_request {
            request_is_enabled(&self.adapter, &self.config, self.endpoint_context, content)
        } else {
            detect_response(&self.adapter, content)
        }
    }

    /// Loads a message, replacing whatever was loaded before. Empty content is
    /// ignored.
    pub fn set_message(&mut self, content: &[u8], is_request: bool) {
        if content.is_empty() {
            return;
        }
        self.content = content.to_vec();
        self.payload = None;
        self.modified = false;
        self.state = if is_request {
            self.decode_request(content)
        } else {
            self.decode_response(content)
        };
    }

    fn decode_request(&mut self, content: &[u8]) -> SessionState {
        let Some(param) = self
            .adapter
            .request_parameter(content, &self.config.payload_param)
        else {
            tracing::warn!(
                "{}: no {} parameter in request",
                self.config.label,
                self.config.payload_param
            );
            return SessionState::Empty;
        };
        self.payload = Some(param.clone());

        let codec = Codec::new(&self.adapter);
        match codec
            .decode(&param.value)
            .and_then(AuraRequestMessage::from_value)
        {
            Ok(message) => SessionState::Request(message),
            Err(error) => {
                tracing::warn!("{}: cannot decode request: {}", self.config.label, error);
                let text = error
                    .fallback_text()
                    .map(str::to_string)
                    .unwrap_or_else(|| codec.decode_text(&param.value));
                SessionState::Undecodable { text, error }
            }
        }
    }

    fn decode_response(&self, content: &[u8]) -> SessionState {
        let info = self.adapter.analyze_response(content);
        let body = content.get(info.body_offset..).unwrap_or_default();
        SessionState::Response(AuraResponseMessage::parse(&String::from_utf8_lossy(body)))
    }

    /// What the session holds.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The decoded request, if one is loaded.
    pub fn request(&self) -> Option<&AuraRequestMessage> {
        match &self.state {
            SessionState::Request(message) => Some(message),
            _ => None,
        }
    }

    /// The decoded request for editing, if one is loaded and the session is
    /// editable.
    pub fn request_mut(&mut self) -> Option<&mut AuraRequestMessage> {
        match &mut self.state {
            SessionState::Request(message) if self.editable => Some(message),
            _ => None,
        }
    }

    /// The parsed response, if one is loaded.
    pub fn response(&self) -> Option<&ParsedResponse> {
        match &self.state {
            SessionState::Response(response) => Some(response),
            _ => None,
        }
    }

    /// Applies a batch of action edits to the loaded request.
    pub fn apply_edits<I>(&mut self, edits: I) -> EditReport
    where
        I: IntoIterator<Item = ActionEdit>,
    {
        match self.request_mut() {
            Some(message) => message.apply_edits(edits),
            None => {
                tracing::debug!("No editable request loaded, ignoring edits");
                EditReport::default()
            }
        }
    }

    /// Returns the message bytes, re-framed with the edited payload when the
    /// request was edited. The payload is written back where it was read
    /// from. Responses and unedited requests come back as loaded.
    pub fn get_message(&mut self) -> Rebuilt {
        let (message, payload) = match (&self.state, &self.payload) {
            (SessionState::Request(message), Some(payload))
                if self.editable && message.is_edited() =>
            {
                (message, payload)
            }
            _ => return Rebuilt::unchanged(&self.content),
        };

        let serialized = match message.serialize() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("{}: {}", self.config.label, e);
                return Rebuilt::with_notice(
                    &self.content,
                    format!("Could not encode {} payload, using original", self.config.label),
                );
            }
        };

        let encoded = Codec::new(&self.adapter).encode_text(&serialized);
        if encoded == payload.value {
            return Rebuilt::unchanged(&self.content);
        }

        let param = self
            .adapter
            .build_parameter(&payload.name, &encoded, payload.location);
        let updated = self.adapter.update_parameter(&self.content, &param);
        if updated == self.content {
            tracing::warn!(
                "{}: {} parameter could not be rewritten",
                self.config.label,
                param.name
            );
            return Rebuilt::with_notice(&self.content, unwritable_notice(&self.config.label));
        }

        self.content = updated;
        self.payload = Some(param);
        self.modified = true;
        Rebuilt::unchanged(&self.content)
    }

    /// Checks if [`ActionsEditor::get_message`] has produced edited bytes.
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

// =============================================================================
// JsonEditor
// =============================================================================

/// Whole-payload JSON editing session, requests only.
#[derive(Debug)]
pub struct JsonEditor<A: WireAdapter> {
    adapter: A,
    config: AuraConfig,
    endpoint_context: bool,
    content: Vec<u8>,
    payload: Option<Parameter>,
    text: String,
}

impl<A: WireAdapter> JsonEditor<A> {
    /// Creates a session that checks endpoint paths.
    pub fn new(adapter: A, config: AuraConfig) -> Self {
        Self {
            adapter,
            config,
            endpoint_context: true,
            content: Vec::new(),
            payload: None,
            text: String::new(),
        }
    }

    /// Sets whether the endpoint path is known.
    pub fn with_endpoint_context(mut self, known: bool) -> Self {
        self.endpoint_context = known;
        self
    }

    /// The session config.
    pub fn config(&self) -> &AuraConfig {
        &self.config
    }

    /// Checks if this session applies to a message. Responses never apply.
    pub fn is_enabled(&self, content: &[u8], is_request: bool) -> bool {
        !content.is_empty()
            && is_request
            && request_is_enabled(&self.adapter, &self.config, self.endpoint_context, content)
    }

    /// Loads a request. The display text is the pretty-printed payload, or
    /// the URL-decoded text when it is not JSON.
    pub fn set_message(&mut self, content: &[u8]) {
        if content.is_empty() {
            return;
        }
        self.content = content.to_vec();
        self.payload = self
            .adapter
            .request_parameter(content, &self.config.payload_param);
        self.text = match &self.payload {
            Some(param) => Codec::new(&self.adapter).display_text(&param.value),
            None => String::new(),
        };
    }

    /// The text to show in an editor.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Checks if the editor text differs from what was loaded.
    pub fn is_modified(&self, current_text: &str) -> bool {
        current_text != self.text
    }

    /// Returns the message bytes with the payload replaced by the editor
    /// text, written back where it was read from (the body when the request
    /// had none). Unchanged text returns the loaded bytes; invalid JSON
    /// returns them with a notice.
    pub fn get_message(&mut self, current_text: &str) -> Rebuilt {
        if !self.is_modified(current_text) {
            return Rebuilt::unchanged(&self.content);
        }

        let codec = Codec::new(&self.adapter);
        let encoded = match parse_json(current_text).and_then(|value| codec.encode(&value)) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!("{}: {}", self.config.label, e);
                return Rebuilt::with_notice(&self.content, INVALID_JSON_NOTICE);
            }
        };

        if self.payload.as_ref().is_some_and(|param| param.value == encoded) {
            self.text = current_text.to_string();
            return Rebuilt::unchanged(&self.content);
        }

        let location = self
            .payload
            .as_ref()
            .map_or(ParameterLocation::Body, |param| param.location);
        let param = self
            .adapter
            .build_parameter(&self.config.payload_param, &encoded, location);
        let updated = self.adapter.update_parameter(&self.content, &param);
        if updated == self.content {
            tracing::warn!(
                "{}: {} parameter could not be rewritten",
                self.config.label,
                param.name
            );
            return Rebuilt::with_notice(&self.content, unwritable_notice(&self.config.label));
        }

        self.content = updated;
        self.payload = Some(param);
        self.text = current_text.to_string();
        Rebuilt::unchanged(&self.content)
    }
}
