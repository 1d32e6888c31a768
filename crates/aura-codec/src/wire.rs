//! Wire adapter: the HTTP framing primitives the engine relies on.
//!
//! The engine never touches raw HTTP framing itself. It asks a [`WireAdapter`]
//! for a named parameter, for the response body offset and MIME label, and to
//! patch one parameter's value into an otherwise untouched byte buffer.
//! [`RawHttpAdapter`] is a reference implementation over raw HTTP/1.x bytes
//! with form-encoded bodies.

use std::fmt::Write as _;
use std::ops::Range;

/// Where a parameter lives in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    /// Request-line query string.
    Url,
    /// Form-encoded request body.
    Body,
}

/// A request parameter. `value` is raw, still URL-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    pub location: ParameterLocation,
}

impl Parameter {
    /// Creates a new parameter.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        location: ParameterLocation,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            location,
        }
    }
}

/// What the adapter learns from a response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    /// Classification label of the stated `Content-Type` (e.g. `JSON`).
    pub stated_mime_type: String,
    /// Byte offset at which the body starts.
    pub body_offset: usize,
}

/// HTTP framing primitives consumed by the engine.
pub trait WireAdapter: Send + Sync {
    /// Looks up a request parameter by (decoded) name.
    fn request_parameter(&self, message: &[u8], name: &str) -> Option<Parameter>;

    /// Returns the request path, when the request line can be read.
    fn request_path(&self, message: &[u8]) -> Option<String>;

    /// Classifies a response and locates its body.
    fn analyze_response(&self, message: &[u8]) -> ResponseInfo;

    /// Builds a parameter to feed into [`WireAdapter::update_parameter`].
    fn build_parameter(&self, name: &str, value: &str, location: ParameterLocation) -> Parameter {
        Parameter::new(name, value, location)
    }

    /// Returns a new buffer with the parameter's value replaced and every
    /// other byte unchanged.
    fn update_parameter(&self, message: &[u8], parameter: &Parameter) -> Vec<u8>;

    /// URL-encodes a string.
    fn url_encode(&self, value: &str) -> String {
        url_encode(value)
    }

    /// URL-decodes a string.
    fn url_decode(&self, value: &str) -> String {
        url_decode(value)
    }
}

/// Reference adapter over raw HTTP/1.x messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawHttpAdapter;

impl RawHttpAdapter {
    /// Creates a new adapter.
    pub fn new() -> Self {
        Self
    }
}

impl WireAdapter for RawHttpAdapter {
    fn request_parameter(&self, message: &[u8], name: &str) -> Option<Parameter> {
        let offset = body_offset(message);
        let head = &message[..offset];

        if is_form_body(head) {
            if let Ok(body) = std::str::from_utf8(&message[offset..]) {
                if let Some(pair) = find_pair(body, name) {
                    return Some(Parameter::new(name, pair.value, ParameterLocation::Body));
                }
            }
        }

        let target = request_target(head)?;
        let query = query_string(&target)?;
        find_pair(query, name).map(|pair| Parameter::new(name, pair.value, ParameterLocation::Url))
    }

    fn request_path(&self, message: &[u8]) -> Option<String> {
        let target = request_target(&message[..body_offset(message)])?;
        Some(path_of(&target).to_string())
    }

    fn analyze_response(&self, message: &[u8]) -> ResponseInfo {
        let offset = body_offset(message);
        let stated_mime_type = header_value(&message[..offset], "content-type")
            .map(|ct| stated_mime_label(&ct))
            .unwrap_or_default();

        ResponseInfo {
            stated_mime_type: stated_mime_type.to_string(),
            body_offset: offset,
        }
    }

    fn update_parameter(&self, message: &[u8], parameter: &Parameter) -> Vec<u8> {
        match parameter.location {
            ParameterLocation::Body => update_body_parameter(message, parameter),
            ParameterLocation::Url => update_url_parameter(message, parameter),
        }
    }
}

// =============================================================================
// Message Framing
// =============================================================================

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Returns the offset just past the blank line ending the head, if any.
fn find_body_offset(message: &[u8]) -> Option<usize> {
    let crlf = find(message, b"\r\n\r\n").map(|pos| (pos, pos + 4));
    let lf = find(message, b"\n\n").map(|pos| (pos, pos + 2));

    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a.1 } else { b.1 }),
        (Some(a), None) => Some(a.1),
        (None, Some(b)) => Some(b.1),
        (None, None) => None,
    }
}

/// Byte offset at which the body starts. A message with no blank line is all
/// head.
pub fn body_offset(message: &[u8]) -> usize {
    find_body_offset(message).unwrap_or(message.len())
}

fn head_lines(head: &[u8]) -> impl Iterator<Item = String> + '_ {
    head.split(|&b| b == b'\n')
        .map(|line| String::from_utf8_lossy(line).trim_end_matches('\r').to_string())
}

fn header_value(head: &[u8], name: &str) -> Option<String> {
    head_lines(head)
        .skip(1)
        .take_while(|line| !line.is_empty())
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
}

fn request_target(head: &[u8]) -> Option<String> {
    let first = head_lines(head).next()?;
    let mut parts = first.split_whitespace();
    let _method = parts.next()?;
    parts.next().map(str::to_string)
}

/// Path component of a request target, absolute-form or origin-form.
fn path_of(target: &str) -> &str {
    let rest = match target.find("://") {
        Some(idx) => {
            let after = &target[idx + 3..];
            match after.find('/') {
                Some(slash) => &after[slash..],
                None => return "/",
            }
        }
        None => target,
    };
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

fn query_string(target: &str) -> Option<&str> {
    let (_, query) = target.split_once('?')?;
    Some(query.split('#').next().unwrap_or(query))
}

fn is_form_body(head: &[u8]) -> bool {
    match header_value(head, "content-type") {
        Some(ct) => ct
            .to_ascii_lowercase()
            .contains("application/x-www-form-urlencoded"),
        None => true,
    }
}

/// Maps a `Content-Type` value to a stated MIME classification label.
pub fn stated_mime_label(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        m if m.contains("json") => "JSON",
        "text/html" => "HTML",
        m if m.contains("javascript") || m.contains("ecmascript") => "script",
        m if m.contains("xml") => "XML",
        "text/css" => "CSS",
        "text/plain" => "text",
        "image/png" => "PNG",
        "image/jpeg" | "image/jpg" => "JPEG",
        "image/gif" => "GIF",
        m if m.starts_with("image/") => "image",
        _ => "",
    }
}

// =============================================================================
// Form Pairs
// =============================================================================

#[derive(Debug)]
struct FormPair<'a> {
    value: &'a str,
    value_range: Range<usize>,
    has_equals: bool,
}

fn find_pair<'a>(text: &'a str, name: &str) -> Option<FormPair<'a>> {
    let mut offset = 0;
    for segment in text.split('&') {
        let start = offset;
        offset += segment.len() + 1;
        if segment.is_empty() {
            continue;
        }

        let (raw_name, value_range, has_equals) = match segment.find('=') {
            Some(eq) => (&segment[..eq], start + eq + 1..start + segment.len(), true),
            None => (segment, start + segment.len()..start + segment.len(), false),
        };

        if url_decode(raw_name) == name {
            return Some(FormPair {
                value: &text[value_range.clone()],
                value_range,
                has_equals,
            });
        }
    }
    None
}

/// Replaces the first `name` pair's raw value, or appends the pair.
fn replace_or_append(text: &str, name: &str, value: &str) -> String {
    let mut out = String::with_capacity(text.len() + value.len());

    match find_pair(text, name) {
        Some(pair) if pair.has_equals => {
            out.push_str(&text[..pair.value_range.start]);
            out.push_str(value);
            out.push_str(&text[pair.value_range.end..]);
        }
        Some(pair) => {
            out.push_str(&text[..pair.value_range.end]);
            out.push('=');
            out.push_str(value);
            out.push_str(&text[pair.value_range.end..]);
        }
        None => {
            out.push_str(text);
            if !text.is_empty() && !text.ends_with('&') {
                out.push('&');
            }
            out.push_str(&url_encode(name));
            out.push('=');
            out.push_str(value);
        }
    }
    out
}

fn update_body_parameter(message: &[u8], parameter: &Parameter) -> Vec<u8> {
    let (head, body): (Vec<u8>, &[u8]) = match find_body_offset(message) {
        Some(offset) => (message[..offset].to_vec(), &message[offset..]),
        None => {
            let mut head = message.to_vec();
            head.extend_from_slice(b"\r\n\r\n");
            (head, &[])
        }
    };

    let Ok(body_text) = std::str::from_utf8(body) else {
        tracing::warn!("Request body is not UTF-8, leaving {} untouched", parameter.name);
        return message.to_vec();
    };

    let new_body = replace_or_append(body_text, &parameter.name, &parameter.value);
    let mut out = if new_body.len() != body.len() {
        set_content_length(&head, new_body.len())
    } else {
        head
    };
    out.extend_from_slice(new_body.as_bytes());
    out
}

fn update_url_parameter(message: &[u8], parameter: &Parameter) -> Vec<u8> {
    let line_end = message
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(message.len());
    let Ok(line) = std::str::from_utf8(&message[..line_end]) else {
        return message.to_vec();
    };

    let mut parts = line.splitn(3, ' ');
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return message.to_vec();
    };
    let version = parts.next();

    let (base, query, fragment) = match target.split_once('?') {
        Some((base, rest)) => match rest.split_once('#') {
            Some((query, fragment)) => (base, query, Some(fragment)),
            None => (base, rest, None),
        },
        None => match target.split_once('#') {
            Some((base, fragment)) => (base, "", Some(fragment)),
            None => (target, "", None),
        },
    };

    let mut new_line = format!(
        "{} {}?{}",
        method,
        base,
        replace_or_append(query, &parameter.name, &parameter.value)
    );
    if let Some(fragment) = fragment {
        new_line.push('#');
        new_line.push_str(fragment);
    }
    if let Some(version) = version {
        new_line.push(' ');
        new_line.push_str(version);
    }

    let mut out = new_line.into_bytes();
    out.extend_from_slice(&message[line_end..]);
    out
}

/// Rewrites an existing `Content-Length` header, keeping its name casing and
/// line ending.
fn set_content_length(head: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(head.len() + 4);
    let mut in_headers = false;

    for line in head.split_inclusive(|&b| b == b'\n') {
        let text = String::from_utf8_lossy(line);
        let content = text.trim_end_matches(['\r', '\n']);

        if in_headers {
            if let Some((key, _)) = content.split_once(':') {
                if key.trim().eq_ignore_ascii_case("content-length") {
                    let ending = &text[content.len()..];
                    out.extend_from_slice(format!("{}: {}{}", key, len, ending).as_bytes());
                    continue;
                }
            }
        }
        in_headers = true;
        out.extend_from_slice(line);
    }
    out
}

// =============================================================================
// URL Encoding
// =============================================================================

/// Form-style URL encoding: space becomes `+`, unreserved characters pass
/// through, everything else is `%XX` over UTF-8 bytes.
pub fn url_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for &b in value.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'*' | b'_' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => {
                let _ = write!(out, "%{:02X}", b);
            }
        }
    }
    out
}

/// Form-style URL decoding. Malformed escapes are kept literally.
pub fn url_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hi = bytes.get(i + 1).and_then(|&b| hex_value(b));
                let lo = bytes.get(i + 2).and_then(|&b| hex_value(b));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}
