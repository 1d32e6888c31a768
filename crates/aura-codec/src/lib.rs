//! Aura Codec - detection, decoding and re-encoding of Aura RPC traffic.
//!
//! Aura clients batch named remote actions into one URL-encoded JSON body
//! parameter (`message`), and servers answer with JSON prefixed by a
//! `while(1);` anti-hijacking guard. This crate turns intercepted messages of
//! that shape into editable, round-trippable objects and back into bytes.
//!
//! ## Architecture
//!
//! ```text
//! raw bytes → Detector (admit/reject)
//!                │
//!                ▼
//!           Codec.decode ──→ AuraRequestMessage ──→ ActionRequest × N
//!                │               (edits set dirty flags per field)
//!                │                          │
//!                │                          ▼
//!                │          Codec.encode (only when edited)
//!                │                          │
//!                ▼                          ▼
//!      AuraResponseMessage        WireAdapter.update_parameter → raw bytes
//!        (read-only, degrades
//!         to raw text)
//! ```
//!
//! HTTP framing is delegated to a [`WireAdapter`]; [`RawHttpAdapter`] works
//! on raw HTTP/1.x buffers with form-encoded bodies.
//!
//! Everything is synchronous and owned per message: sessions for different
//! exchanges share nothing and need no locking.

pub mod action;
pub mod codec;
pub mod config;
pub mod detector;
pub mod editor;
mod error;
pub mod request;
pub mod response;
pub mod wire;

pub use action::{ActionRequest, Descriptor};
pub use codec::{parse_json, pretty_print, Codec};
pub use config::{
    AuraConfig, AURA_DATAPARAM, AURA_ENDPOINT_MARKER, AURA_INDICATOR, AURA_RESPONSE_START,
    JSON_MIME_TYPE,
};
pub use detector::{detect_response, is_aura_request, is_aura_request_with, is_aura_response};
pub use editor::{ActionsEditor, JsonEditor, Rebuilt, SessionState, INVALID_JSON_NOTICE};
pub use error::{AuraError, Result};
pub use request::{ActionEdit, AuraRequestMessage, EditReport};
pub use response::{ActionResponse, ActionResult, AuraResponseMessage, ParsedResponse, RawResponse};
pub use wire::{Parameter, ParameterLocation, RawHttpAdapter, ResponseInfo, WireAdapter};
