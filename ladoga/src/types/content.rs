//! Text, image, audio and embedded-resource content utilities

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use crate::error::{Error, ErrorCode};
use crate::types::{Annotations, ResourceContents};

/// A value passed inside tool results, prompt messages and embedded resources.
///
/// Decoding rejects unknown `type` tags; unknown keys under annotations are tolerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    /// Text content
    #[serde(rename = "text")]
    Text(TextContent),

    /// Image content
    #[serde(rename = "image")]
    Image(ImageContent),

    /// Audio content
    #[serde(rename = "audio")]
    Audio(AudioContent),

    /// Embedded resource
    #[serde(rename = "resource")]
    Resource(EmbeddedResource),
}

/// Text provided to or from an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// The text content of the message.
    pub text: String,

    /// Optional annotations for the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// An image provided to or from an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    /// The base64-encoded image data.
    pub data: String,

    /// The MIME type of the image content, e.g. "image/jpeg" or "image/png".
    #[serde(rename = "mimeType")]
    pub mime: String,

    /// Optional annotations for the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// Audio provided to or from an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioContent {
    /// The base64-encoded audio data.
    pub data: String,

    /// The MIME type of the audio content, e.g. "audio/mpeg" or "audio/wav".
    #[serde(rename = "mimeType")]
    pub mime: String,

    /// Optional annotations for the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// The contents of a resource, embedded into a prompt or tool call result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    /// The resource content of the message.
    pub resource: ResourceContents,

    /// Optional annotations for the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

impl Content {
    /// Creates text content
    #[inline]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextContent { text: text.into(), annotations: None })
    }

    /// Creates image content from raw bytes
    #[inline]
    pub fn image(bytes: &[u8], mime: &str) -> Self {
        Self::Image(ImageContent {
            data: BASE64.encode(bytes),
            mime: mime.into(),
            annotations: None
        })
    }

    /// Creates audio content from raw bytes
    #[inline]
    pub fn audio(bytes: &[u8], mime: &str) -> Self {
        Self::Audio(AudioContent {
            data: BASE64.encode(bytes),
            mime: mime.into(),
            annotations: None
        })
    }

    /// Creates embedded resource content
    #[inline]
    pub fn resource(resource: ResourceContents) -> Self {
        Self::Resource(EmbeddedResource { resource, annotations: None })
    }

    /// Parses an already-deserialized object into tagged content.
    ///
    /// This is the single entry point shared by tool-result and
    /// prompt-message deserialization.
    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value)
            .map_err(|err| Error::new(ErrorCode::InvalidParams, err.to_string()))
    }
}

impl From<&str> for Content {
    #[inline]
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Content {
    #[inline]
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl TryFrom<Content> for TextContent {
    type Error = Error;

    #[inline]
    fn try_from(value: Content) -> Result<Self, Self::Error> {
        match value {
            Content::Text(text) => Ok(text),
            _ => Err(Error::new(ErrorCode::InternalError, "Invalid content type")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_serializes_text_content_with_type_tag() {
        let content = Content::text("hello");

        let json = serde_json::to_string(&content).unwrap();

        assert_eq!(json, r#"{"type":"text","text":"hello"}"#);
    }

    #[test]
    fn it_round_trips_each_variant() {
        let variants = [
            Content::text("hi"),
            Content::image(b"png-bytes", "image/png"),
            Content::audio(b"wav-bytes", "audio/wav"),
            Content::resource(ResourceContents::text("res://a", "text/plain", "body")),
        ];

        for content in variants {
            let json = serde_json::to_string(&content).unwrap();
            let parsed: Content = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, content);
        }
    }

    #[test]
    fn it_rejects_unknown_type_tags() {
        let result = Content::from_value(serde_json::json!({
            "type": "video",
            "data": "..."
        }));

        assert!(result.is_err());
    }

    #[test]
    fn it_tolerates_unknown_annotation_keys() {
        let content = Content::from_value(serde_json::json!({
            "type": "text",
            "text": "hi",
            "annotations": { "audience": ["user"], "customKey": true }
        })).unwrap();

        assert!(matches!(content, Content::Text(_)));
    }

    #[test]
    fn it_keeps_base64_payload_byte_identical() {
        let bytes = [0u8, 1, 2, 250, 251, 252];
        let content = Content::image(&bytes, "image/png");

        let json = serde_json::to_string(&content).unwrap();
        let Content::Image(image) = serde_json::from_str::<Content>(&json).unwrap() else {
            panic!("expected image content");
        };

        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(image.data)
            .unwrap();
        assert_eq!(decoded, bytes);
    }
}
