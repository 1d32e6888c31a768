//! Error types for the Aura codec.

use thiserror::Error;

/// Aura codec error type.
#[derive(Debug, Error)]
pub enum AuraError {
    /// Payload is not valid JSON after URL-decoding and guard stripping.
    ///
    /// `fallback` holds the text that failed to parse so a caller can still
    /// display something.
    #[error("Malformed JSON: {source}")]
    MalformedJson {
        fallback: String,
        #[source]
        source: serde_json::Error,
    },

    /// The top-level payload has no `actions` array.
    #[error("Payload has no actions array")]
    MissingActions,

    /// An action object lacks its `id` field.
    #[error("Action at index {index} has no id")]
    MissingActionId { index: usize },

    /// Two actions in one payload share an id.
    #[error("Duplicate action id: {id}")]
    DuplicateActionId { id: String },

    /// No action with this id exists in the message.
    #[error("Action not found: {id}")]
    ActionNotFound { id: String },

    /// Edited params text for one action is not valid JSON.
    #[error("Invalid params JSON for action {id}: {source}")]
    InvalidParamsJson {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Edited params parsed, but not to a JSON object.
    #[error("Params for action {id} must be a JSON object")]
    InvalidParams { id: String },

    /// Serializing an otherwise valid tree failed.
    #[error("Encode failure: {0}")]
    EncodeFailure(#[source] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuraError {
    /// Returns the displayable fallback text carried by a decode failure.
    pub fn fallback_text(&self) -> Option<&str> {
        match self {
            Self::MalformedJson { fallback, .. } => Some(fallback),
            _ => None,
        }
    }

    /// Returns the action id this error is scoped to, if any.
    pub fn action_id(&self) -> Option<&str> {
        match self {
            Self::InvalidParamsJson { id, .. }
            | Self::InvalidParams { id }
            | Self::ActionNotFound { id }
            | Self::DuplicateActionId { id } => Some(id),
            _ => None,
        }
    }

    /// Checks if this error is scoped to one action's edit and is recoverable.
    pub fn is_edit_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParamsJson { .. } | Self::InvalidParams { .. }
        )
    }
}

/// Result type for Aura codec operations.
pub type Result<T> = std::result::Result<T, AuraError>;
