//! Decoded Aura request payloads.
//!
//! An [`AuraRequestMessage`] owns the top-level payload object and one
//! [`ActionRequest`] per element of its `actions` array, in source order.
//! Serializing rebuilds the payload from the parsed source, swapping in only
//! the fields that were actually edited.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::ActionRequest;
use crate::codec::{compact, parse_json};
use crate::error::{AuraError, Result};

/// Top-level payload key holding the action list.
pub const ACTIONS_KEY: &str = "actions";

/// A set of edits for one action, as captured from an editor.
///
/// `params` is the editor's current params text; it is parsed on apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEdit {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl ActionEdit {
    /// Creates an empty edit for an action.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the params text.
    pub fn with_params(mut self, text: impl Into<String>) -> Self {
        self.params = Some(text.into());
        self
    }

    /// Sets the controller.
    pub fn with_controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    /// Sets the method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }
}

/// Outcome of applying a batch of edits.
#[derive(Debug, Default)]
pub struct EditReport {
    /// Ids of actions that changed, in application order.
    pub changed: Vec<String>,
    /// Per-action failures. Each failed action kept its previous values.
    pub failures: Vec<AuraError>,
}

impl EditReport {
    /// Checks if every edit applied.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A decoded Aura request payload.
#[derive(Debug, Clone)]
pub struct AuraRequestMessage {
    source: Map<String, Value>,
    actions: Vec<ActionRequest>,
    index: HashMap<String, usize>,
    fields_edited: bool,
}

impl AuraRequestMessage {
    /// Parses URL-decoded payload text.
    pub fn parse(json_text: &str) -> Result<Self> {
        Self::from_value(parse_json(json_text)?)
    }

    /// Builds a message from an already parsed payload.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(source) = value else {
            return Err(AuraError::MissingActions);
        };
        let list = source
            .get(ACTIONS_KEY)
            .and_then(Value::as_array)
            .ok_or(AuraError::MissingActions)?;

        let mut actions = Vec::with_capacity(list.len());
        let mut index = HashMap::with_capacity(list.len());

        for (i, item) in list.iter().enumerate() {
            let action = ActionRequest::from_value(i, item.clone())?;
            if index.insert(action.id().to_string(), i).is_some() {
                return Err(AuraError::DuplicateActionId {
                    id: action.id().to_string(),
                });
            }
            actions.push(action);
        }

        tracing::debug!("Decoded Aura request with {} actions", actions.len());

        Ok(Self {
            source,
            actions,
            index,
            fields_edited: false,
        })
    }

    /// Looks up an action by id.
    pub fn action(&self, id: &str) -> Result<&ActionRequest> {
        self.index
            .get(id)
            .map(|&i| &self.actions[i])
            .ok_or_else(|| AuraError::ActionNotFound { id: id.to_string() })
    }

    /// Looks up an action by id for editing.
    pub fn action_mut(&mut self, id: &str) -> Result<&mut ActionRequest> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.actions[i]),
            None => Err(AuraError::ActionNotFound { id: id.to_string() }),
        }
    }

    /// Actions in source order.
    pub fn actions(&self) -> impl Iterator<Item = &ActionRequest> {
        self.actions.iter()
    }

    /// Action ids in source order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(ActionRequest::id)
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Checks if the payload carries no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// A top-level payload field, as parsed.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.source.get(key)
    }

    /// Replaces a top-level field other than `actions`. Returns whether
    /// anything changed.
    ///
    /// The action list is owned by the actions themselves; replacing it here
    /// is refused.
    pub fn set_field(&mut self, key: &str, value: Value) -> bool {
        if key == ACTIONS_KEY {
            tracing::warn!("Refusing to replace the action list as a plain field");
            return false;
        }
        if self.source.get(key) == Some(&value) {
            return false;
        }
        self.source.insert(key.to_string(), value);
        self.fields_edited = true;
        true
    }

    /// Checks if any action or top-level field was edited.
    pub fn is_edited(&self) -> bool {
        self.fields_edited || self.actions.iter().any(ActionRequest::is_modified)
    }

    /// Applies edits action by action. A failing action keeps its previous
    /// values and does not stop the others.
    pub fn apply_edits<I>(&mut self, edits: I) -> EditReport
    where
        I: IntoIterator<Item = ActionEdit>,
    {
        let mut report = EditReport::default();

        for edit in edits {
            let action = match self.action_mut(&edit.id) {
                Ok(action) => action,
                Err(e) => {
                    tracing::warn!("Skipping edit: {}", e);
                    report.failures.push(e);
                    continue;
                }
            };

            let mut changed = false;
            if let Some(text) = &edit.params {
                match action.set_params_text(text) {
                    Ok(c) => changed |= c,
                    Err(e) => {
                        tracing::warn!("{}, keeping previous params", e);
                        report.failures.push(e);
                    }
                }
            }
            if let Some(controller) = &edit.controller {
                changed |= action.set_controller(controller);
            }
            if let Some(method) = &edit.method {
                changed |= action.set_method(method);
            }

            if changed {
                report.changed.push(edit.id);
            }
        }

        report
    }

    /// Rebuilds the payload tree.
    pub fn to_value(&self) -> Value {
        let mut object = self.source.clone();
        object.insert(
            ACTIONS_KEY.to_string(),
            Value::Array(self.actions.iter().map(ActionRequest::to_value).collect()),
        );
        Value::Object(object)
    }

    /// Serializes the payload as compact JSON text.
    pub fn serialize(&self) -> Result<String> {
        compact(&self.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAYLOAD: &str = r#"{"actions":[{"id":"1;a","descriptor":"serviceComponent://ui.force.components.controllers.hostConfig.HostConfigController/ACTION$getConfigData","callingDescriptor":"UNKNOWN","params":{}},{"id":"2;a","descriptor":"apex://AccountController/ACTION$getAccounts","callingDescriptor":"markup://c:accountList","params":{"limit":5}}],"flags":{"background":false}}"#;

    // ==================== Parse ====================

    #[test]
    fn parse_keeps_source_order() {
        let msg = AuraRequestMessage::parse(PAYLOAD).unwrap();
        assert_eq!(msg.ids().collect::<Vec<_>>(), vec!["1;a", "2;a"]);
        assert_eq!(msg.len(), 2);
        assert!(!msg.is_empty());
        assert!(!msg.is_edited());
    }

    #[test]
    fn parse_requires_actions_array() {
        assert!(matches!(
            AuraRequestMessage::parse(r#"{"flags":{}}"#),
            Err(AuraError::MissingActions)
        ));
        assert!(matches!(
            AuraRequestMessage::parse(r#"{"actions":{}}"#),
            Err(AuraError::MissingActions)
        ));
        assert!(matches!(
            AuraRequestMessage::parse("[]"),
            Err(AuraError::MissingActions)
        ));
    }

    #[test]
    fn parse_rejects_missing_id() {
        let err =
            AuraRequestMessage::parse(r#"{"actions":[{"id":"1;a"},{"params":{}}]}"#).unwrap_err();
        assert!(matches!(err, AuraError::MissingActionId { index: 1 }));
    }

    #[test]
    fn parse_rejects_duplicate_id() {
        let err =
            AuraRequestMessage::parse(r#"{"actions":[{"id":"1;a"},{"id":"1;a"}]}"#).unwrap_err();
        assert!(matches!(err, AuraError::DuplicateActionId { .. }));
    }

    #[test]
    fn parse_rejects_malformed_json() {
        let err = AuraRequestMessage::parse(r#"{"actions":["#).unwrap_err();
        assert_eq!(err.fallback_text(), Some(r#"{"actions":["#));
    }

    #[test]
    fn empty_action_list_is_valid() {
        let msg = AuraRequestMessage::parse(r#"{"actions":[]}"#).unwrap();
        assert!(msg.is_empty());
        assert_eq!(msg.serialize().unwrap(), r#"{"actions":[]}"#);
    }

    // ==================== Lookup ====================

    #[test]
    fn action_lookup() {
        let msg = AuraRequestMessage::parse(PAYLOAD).unwrap();
        assert_eq!(msg.action("2;a").unwrap().method(), "getAccounts");
        assert!(matches!(
            msg.action("9;a"),
            Err(AuraError::ActionNotFound { .. })
        ));
    }

    // ==================== Serialize ====================

    #[test]
    fn unedited_serialize_is_identical() {
        let msg = AuraRequestMessage::parse(PAYLOAD).unwrap();
        assert_eq!(msg.serialize().unwrap(), PAYLOAD);
        assert_eq!(msg.serialize().unwrap(), msg.serialize().unwrap());
    }

    #[test]
    fn edited_action_serializes_only_its_changes() {
        let mut msg = AuraRequestMessage::parse(PAYLOAD).unwrap();
        msg.action_mut("2;a")
            .unwrap()
            .set_params_text(r#"{"limit": 500}"#)
            .unwrap();
        assert!(msg.is_edited());

        let out: Value = serde_json::from_str(&msg.serialize().unwrap()).unwrap();
        assert_eq!(out["actions"][1]["params"], json!({"limit": 500}));
        assert_eq!(out["actions"][0]["params"], json!({}));
        assert_eq!(out["flags"], json!({"background": false}));
    }

    #[test]
    fn field_edit_marks_message() {
        let mut msg = AuraRequestMessage::parse(PAYLOAD).unwrap();
        assert!(!msg.set_field("flags", json!({"background": false})));
        assert!(!msg.is_edited());
        assert!(msg.set_field("flags", json!({"background": true})));
        assert!(msg.is_edited());
        assert!(!msg.set_field("actions", json!([])));
        assert_eq!(msg.len(), 2);
    }

    // ==================== Edit Batches ====================

    #[test]
    fn apply_edits_reports_changes() {
        let mut msg = AuraRequestMessage::parse(PAYLOAD).unwrap();
        let report = msg.apply_edits(vec![
            ActionEdit::new("1;a").with_params("{}"),
            ActionEdit::new("2;a").with_method("deleteAccounts"),
        ]);
        assert!(report.is_clean());
        assert_eq!(report.changed, vec!["2;a".to_string()]);
        assert_eq!(
            msg.action("2;a").unwrap().descriptor(),
            "apex://AccountController/ACTION$deleteAccounts"
        );
    }

    #[test]
    fn apply_edits_scopes_failures() {
        let mut msg = AuraRequestMessage::parse(PAYLOAD).unwrap();
        let report = msg.apply_edits(vec![
            ActionEdit::new("1;a").with_params("{\"broken\": "),
            ActionEdit::new("2;a").with_params(r#"{"limit": 1}"#),
            ActionEdit::new("3;a").with_controller("X"),
        ]);

        assert_eq!(report.changed, vec!["2;a".to_string()]);
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(
            report.failures[0],
            AuraError::InvalidParamsJson { ref id, .. } if id == "1;a"
        ));
        assert!(matches!(report.failures[1], AuraError::ActionNotFound { .. }));

        let out: Value = serde_json::from_str(&msg.serialize().unwrap()).unwrap();
        assert_eq!(out["actions"][0]["params"], json!({}));
        assert_eq!(out["actions"][1]["params"], json!({"limit": 1}));
    }

    #[test]
    fn action_edit_deserializes_partial() {
        let edit: ActionEdit = serde_json::from_str(r#"{"id":"1;a","method":"m"}"#).unwrap();
        assert_eq!(edit, ActionEdit::new("1;a").with_method("m"));
    }
}
