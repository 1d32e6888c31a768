//! One decoded action invocation.
//!
//! An [`ActionRequest`] keeps the source action object as it was parsed and
//! layers three independently editable fields on top: controller, method and
//! params. Each setter compares against the current value and only records an
//! edit on a real change, so echoing a value back is a no-op.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::codec::{parse_json, pretty_print};
use crate::error::{AuraError, Result};

/// Action object key holding the action id.
pub const ID_KEY: &str = "id";

/// Action object key holding the action descriptor.
pub const DESCRIPTOR_KEY: &str = "descriptor";

/// Action object key holding the action params.
pub const PARAMS_KEY: &str = "params";

/// Separator between controller and method in a descriptor.
const ACTION_MARKER: &str = "/ACTION$";

static DESCRIPTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<prefix>[A-Za-z][A-Za-z0-9+.\-]*://)?(?P<controller>.*?)/ACTION\$(?P<method>.*)$")
        .expect("Invalid regex pattern")
});

// =============================================================================
// Descriptor
// =============================================================================

/// An action descriptor, `<scheme>://<controller>/ACTION$<method>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    prefix: String,
    controller: String,
    method: String,
    has_action: bool,
}

impl Descriptor {
    /// Splits a descriptor into its parts. Text without the action marker is
    /// taken whole as the controller.
    pub fn parse(text: &str) -> Self {
        match DESCRIPTOR_RE.captures(text) {
            Some(caps) => Self {
                prefix: caps
                    .name("prefix")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                controller: caps["controller"].to_string(),
                method: caps["method"].to_string(),
                has_action: true,
            },
            None => Self {
                prefix: String::new(),
                controller: text.to_string(),
                method: String::new(),
                has_action: false,
            },
        }
    }

    /// Scheme prefix including `://`, e.g. `apex://`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Controller part.
    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// Method part.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Reassembles the descriptor text.
    pub fn render(&self) -> String {
        if self.has_action || !self.method.is_empty() {
            format!(
                "{}{}{}{}",
                self.prefix, self.controller, ACTION_MARKER, self.method
            )
        } else {
            format!("{}{}", self.prefix, self.controller)
        }
    }
}

// =============================================================================
// ActionRequest
// =============================================================================

/// A decoded action invocation with edit tracking.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    id: String,
    source: Map<String, Value>,
    descriptor: Descriptor,
    params: Value,
    controller_edited: bool,
    method_edited: bool,
    params_edited: bool,
}

impl ActionRequest {
    /// Builds an action from the `index`-th element of an `actions` array.
    ///
    /// The element must be an object with a string `id`; ids cannot be
    /// synthesized since they route edits back to the right action.
    pub fn from_value(index: usize, value: Value) -> Result<Self> {
        let Value::Object(source) = value else {
            return Err(AuraError::MissingActionId { index });
        };

        let id = source
            .get(ID_KEY)
            .and_then(Value::as_str)
            .ok_or(AuraError::MissingActionId { index })?
            .to_string();

        let descriptor = source
            .get(DESCRIPTOR_KEY)
            .and_then(Value::as_str)
            .map(Descriptor::parse)
            .unwrap_or_else(|| Descriptor::parse(""));

        let params = source
            .get(PARAMS_KEY)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        Ok(Self {
            id,
            source,
            descriptor,
            params,
            controller_edited: false,
            method_edited: false,
            params_edited: false,
        })
    }

    /// The action id, as assigned by the source payload.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The called controller.
    pub fn controller(&self) -> &str {
        self.descriptor.controller()
    }

    /// The called method.
    pub fn method(&self) -> &str {
        self.descriptor.method()
    }

    /// The current descriptor text.
    pub fn descriptor(&self) -> String {
        if self.controller_edited || self.method_edited {
            self.descriptor.render()
        } else {
            self.source
                .get(DESCRIPTOR_KEY)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default()
        }
    }

    /// The current params.
    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Current params pretty-printed for display.
    pub fn params_pretty(&self) -> String {
        pretty_print(&self.params).unwrap_or_else(|e| e.to_string())
    }

    /// A field of the source action object, as parsed.
    pub fn source_field(&self, key: &str) -> Option<&Value> {
        self.source.get(key)
    }

    /// Replaces the controller. Returns whether anything changed.
    pub fn set_controller(&mut self, controller: &str) -> bool {
        if self.descriptor.controller == controller {
            return false;
        }
        self.descriptor.controller = controller.to_string();
        self.controller_edited = true;
        true
    }

    /// Replaces the method. Returns whether anything changed.
    pub fn set_method(&mut self, method: &str) -> bool {
        if self.descriptor.method == method {
            return false;
        }
        self.descriptor.method = method.to_string();
        self.method_edited = true;
        true
    }

    /// Replaces the params with a JSON object. Returns whether anything
    /// changed; a non-object leaves the params as they were.
    pub fn set_params(&mut self, params: Value) -> Result<bool> {
        if !params.is_object() {
            return Err(AuraError::InvalidParams {
                id: self.id.clone(),
            });
        }
        if self.params == params {
            return Ok(false);
        }
        self.params = params;
        self.params_edited = true;
        Ok(true)
    }

    /// Replaces the params from editor text.
    ///
    /// Invalid JSON yields [`AuraError::InvalidParamsJson`] and keeps the
    /// last good params.
    pub fn set_params_text(&mut self, text: &str) -> Result<bool> {
        let params = match parse_json(text) {
            Ok(params) => params,
            Err(AuraError::MalformedJson { source, .. }) => {
                return Err(AuraError::InvalidParamsJson {
                    id: self.id.clone(),
                    source,
                })
            }
            Err(e) => return Err(e),
        };
        self.set_params(params)
    }

    /// Checks if any field was edited since decode.
    pub fn is_modified(&self) -> bool {
        self.controller_edited || self.method_edited || self.params_edited
    }

    /// Rebuilds the action object. Unedited fields and unknown keys come
    /// straight from the source; edited fields keep their original position.
    pub fn to_value(&self) -> Value {
        let mut object = self.source.clone();
        if self.params_edited {
            object.insert(PARAMS_KEY.to_string(), self.params.clone());
        }
        if self.controller_edited || self.method_edited {
            object.insert(
                DESCRIPTOR_KEY.to_string(),
                Value::String(self.descriptor.render()),
            );
        }
        Value::Object(object)
    }
}
