//! Represents an MCP resource

use std::collections::HashMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use crate::types::{Annotations, Cursor};

/// List of commands for Resources
pub mod commands {
    pub const LIST: &str = "resources/list";
    pub const TEMPLATES_LIST: &str = "resources/templates/list";
    pub const READ: &str = "resources/read";
    pub const SUBSCRIBE: &str = "resources/subscribe";
    pub const UNSUBSCRIBE: &str = "resources/unsubscribe";
    pub const LIST_CHANGED: &str = "notifications/resources/list_changed";
    pub const UPDATED: &str = "notifications/resources/updated";
}

/// A concrete resource the server is capable of reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// The URI of this resource. Unique key.
    pub uri: String,

    /// A human-readable name for this resource.
    pub name: String,

    /// A description of what this resource represents.
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub descr: Option<String>,

    /// The MIME type of this resource, if known.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,

    /// Optional annotations for the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// A parameterized resource: an RFC 6570 style URI template bound to a read handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTemplate {
    /// The URI template, e.g. `res://{name}`.
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,

    /// A human-readable name for the template.
    pub name: String,

    /// A description of what resources the template produces.
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub descr: Option<String>,

    /// The MIME type of produced resources, if uniform.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

/// The contents of a specific resource, either text or base64 blob.
/// The two forms are told apart by the `text` vs `blob` member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContents {
    /// Text form
    Text(TextResourceContents),
    /// Binary form
    Blob(BlobResourceContents),
}

/// Text contents of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextResourceContents {
    /// The URI of the resource.
    pub uri: String,

    /// The MIME type, if known.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,

    /// The text of the resource.
    pub text: String,
}

/// Binary contents of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobResourceContents {
    /// The URI of the resource.
    pub uri: String,

    /// The MIME type, if known.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,

    /// Base64-encoded resource payload.
    pub blob: String,
}

impl Resource {
    /// Creates a new [`Resource`]
    pub fn new(uri: &str, name: &str) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            descr: None,
            mime: None,
            annotations: None,
        }
    }

    /// Sets the description
    pub fn with_descr(mut self, descr: &str) -> Self {
        self.descr = Some(descr.into());
        self
    }

    /// Sets the MIME type
    pub fn with_mime(mut self, mime: &str) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

impl ResourceTemplate {
    /// Creates a new [`ResourceTemplate`]
    pub fn new(uri_template: &str, name: &str) -> Self {
        Self {
            uri_template: uri_template.into(),
            name: name.into(),
            descr: None,
            mime: None,
        }
    }

    /// Sets the description
    pub fn with_descr(mut self, descr: &str) -> Self {
        self.descr = Some(descr.into());
        self
    }

    /// Sets the MIME type
    pub fn with_mime(mut self, mime: &str) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Matches a concrete URI against this template, segment by segment.
    /// A `{var}` segment captures exactly one non-empty segment.
    pub fn match_uri(&self, uri: &str) -> Option<HashMap<String, String>> {
        let template_parts: Vec<&str> = self.uri_template.split('/').collect();
        let uri_parts: Vec<&str> = uri.split('/').collect();
        if template_parts.len() != uri_parts.len() {
            return None;
        }

        let mut args = HashMap::new();
        for (pattern, part) in template_parts.iter().zip(uri_parts) {
            match pattern.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(var) if !part.is_empty() => {
                    args.insert(var.to_string(), part.to_string());
                }
                Some(_) => return None,
                None if *pattern == part => (),
                None => return None,
            }
        }
        Some(args)
    }
}

impl ResourceContents {
    /// Creates text contents
    pub fn text(uri: &str, mime: &str, text: impl Into<String>) -> Self {
        Self::Text(TextResourceContents {
            uri: uri.into(),
            mime: Some(mime.into()),
            text: text.into(),
        })
    }

    /// Creates blob contents from raw bytes
    pub fn blob(uri: &str, mime: &str, bytes: &[u8]) -> Self {
        Self::Blob(BlobResourceContents {
            uri: uri.into(),
            mime: Some(mime.into()),
            blob: BASE64.encode(bytes),
        })
    }

    /// Returns the URI the contents belong to
    pub fn uri(&self) -> &str {
        match self {
            Self::Text(text) => &text.uri,
            Self::Blob(blob) => &blob.uri,
        }
    }
}

/// Sent from the client to request a list of resources the server has.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListResourcesRequestParams {
    /// An opaque token representing the current pagination position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// A response to a `resources/list` request.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListResourcesResult {
    /// Resources in registration order
    pub resources: Vec<Resource>,

    /// Token of the next page, absent on the last one
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// Sent from the client to request a list of resource templates.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListResourceTemplatesRequestParams {
    /// An opaque token representing the current pagination position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// A response to a `resources/templates/list` request.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListResourceTemplatesResult {
    /// Templates in registration order
    #[serde(rename = "resourceTemplates")]
    pub templates: Vec<ResourceTemplate>,

    /// Token of the next page, absent on the last one
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// Params of a `resources/read` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceRequestParams {
    /// The URI to read.
    pub uri: String,
}

/// A response to a `resources/read` request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadResourceResult {
    /// One or more content blocks for the URI
    pub contents: Vec<ResourceContents>,
}

impl From<ResourceContents> for ReadResourceResult {
    #[inline]
    fn from(contents: ResourceContents) -> Self {
        Self { contents: vec![contents] }
    }
}

/// Params of `resources/subscribe` and `resources/unsubscribe` requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequestParams {
    /// The URI to (un)subscribe to.
    pub uri: String,
}
