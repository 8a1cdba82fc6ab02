//! # Metadata Envelope
//!
//! Trailing comment carrying a hash-guarded document snapshot:
//!
//! ```text
//! <p>…exported markup…</p>
//! <!--LUTHOR_STATE:base64({"version":1,"htmlHash":"…","editorState":{…}})-->
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;
use crate::hash::content_hash;

pub const ENVELOPE_PREFIX: &str = "<!--LUTHOR_STATE:";
pub const ENVELOPE_SUFFIX: &str = "-->";
pub const ENVELOPE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub version: u32,
    pub html_hash: String,
    pub editor_state: Value,
}

impl Envelope {
    pub fn new(html: &str, editor_state: Value) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            html_hash: content_hash(html),
            editor_state,
        }
    }

    pub fn encode(&self) -> Result<String, CodecError> {
        let json = serde_json::to_vec(self)?;
        Ok(format!("{}{}{}", ENVELOPE_PREFIX, STANDARD.encode(json), ENVELOPE_SUFFIX))
    }

    pub fn decode(body: &str) -> Result<Self, CodecError> {
        let bytes = STANDARD.decode(body.trim())?;
        let envelope: Envelope = serde_json::from_slice(&bytes)?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(CodecError::Envelope(format!(
                "unsupported version {}",
                envelope.version
            )));
        }
        Ok(envelope)
    }

    /// Whether the markup still matches what was exported
    pub fn matches(&self, html: &str) -> bool {
        content_hash(html) == self.html_hash
    }
}

/// Append the envelope for `snapshot` to exported markup
pub fn append(html: &str, snapshot: Value) -> Result<String, CodecError> {
    let comment = Envelope::new(html, snapshot).encode()?;
    Ok(format!("{}\n{}", html, comment))
}

/// Split markup into the body and its trailing envelope, if any.
///
/// Only a comment that ends the document counts. A malformed envelope is
/// returned as an error alongside the stripped body.
pub fn extract(html: &str) -> (&str, Option<Result<Envelope, CodecError>>) {
    let trimmed = html.trim_end();
    if !trimmed.ends_with(ENVELOPE_SUFFIX) {
        return (html, None);
    }
    let Some(start) = trimmed.rfind(ENVELOPE_PREFIX) else {
        return (html, None);
    };
    let inner = &trimmed[start + ENVELOPE_PREFIX.len()..trimmed.len() - ENVELOPE_SUFFIX.len()];
    if inner.contains(ENVELOPE_SUFFIX) {
        return (html, None);
    }
    (&html[..start], Some(Envelope::decode(inner)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_then_extract() {
        let html = "<p>Hello</p>";
        let output = append(html, json!({"root": {"children": []}})).unwrap();
        assert!(output.starts_with(html));
        assert_eq!(output.matches(ENVELOPE_PREFIX).count(), 1);

        let (body, envelope) = extract(&output);
        let envelope = envelope.unwrap().unwrap();
        assert!(envelope.matches(body));
        assert_eq!(envelope.version, 1);
        assert_eq!(envelope.editor_state, json!({"root": {"children": []}}));
    }

    #[test]
    fn test_payload_uses_camel_case_keys() {
        let output = append("<p>x</p>", json!({})).unwrap();
        let (_, envelope) = extract(&output);
        let value = serde_json::to_value(envelope.unwrap().unwrap()).unwrap();
        assert!(value.get("htmlHash").is_some());
        assert!(value.get("editorState").is_some());
    }

    #[test]
    fn test_plain_markup_has_no_envelope() {
        let (body, envelope) = extract("<p>Hi</p><!-- note -->");
        assert_eq!(body, "<p>Hi</p><!-- note -->");
        assert!(envelope.is_none());
    }

    #[test]
    fn test_corrupt_envelope_is_reported() {
        let (body, envelope) = extract("<p>Hi</p><!--LUTHOR_STATE:@@@-->");
        assert_eq!(body, "<p>Hi</p>");
        assert!(matches!(envelope, Some(Err(CodecError::Base64(_)))));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let json = serde_json::to_vec(&json!({"version": 2, "htmlHash": "0", "editorState": {}})).unwrap();
        let html = format!("<p></p>{}{}{}", ENVELOPE_PREFIX, STANDARD.encode(json), ENVELOPE_SUFFIX);
        let (_, envelope) = extract(&html);
        assert!(matches!(envelope, Some(Err(CodecError::Envelope(_)))));
    }
}
