//! Types used by the MCP protocol
//!
//! See the [specification](https://github.com/modelcontextprotocol/specification) for details

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::{Error, ErrorCode};
use crate::types::notification::Notification;
use crate::SDK_NAME;

pub use request::{Request, RequestId};
pub use response::{ErrorDetails, Response};
pub use content::{
    Content,
    TextContent,
    ImageContent,
    AudioContent,
    EmbeddedResource,
};
pub use capabilities::{
    ClientCapabilities,
    ServerCapabilities,
    ToolsCapability,
    ResourcesCapability,
    PromptsCapability,
    LoggingCapability,
};
pub use tool::{
    Tool,
    ToolSchema,
    SchemaProperty,
    PropertyType,
    RequestParamsMeta,
    ListToolsRequestParams,
    ListToolsResult,
    CallToolRequestParams,
    CallToolResponse,
};
pub use resource::{
    Resource,
    ResourceTemplate,
    ResourceContents,
    TextResourceContents,
    BlobResourceContents,
    ListResourcesRequestParams,
    ListResourcesResult,
    ListResourceTemplatesRequestParams,
    ListResourceTemplatesResult,
    ReadResourceRequestParams,
    ReadResourceResult,
    SubscribeRequestParams,
};
pub use prompt::{
    Prompt,
    PromptArgument,
    PromptMessage,
    ListPromptsRequestParams,
    ListPromptsResult,
    GetPromptRequestParams,
    GetPromptResult,
};
pub use completion::{
    CompleteRequestParams,
    CompleteResult,
    Completion,
    Argument,
};
pub use cursor::{Cursor, Page};
pub use progress::ProgressToken;

pub mod request;
pub mod response;
pub mod notification;
pub mod content;
pub mod capabilities;
pub mod tool;
pub mod resource;
pub mod prompt;
pub mod completion;
pub mod cursor;
pub mod progress;

pub(crate) const JSONRPC_VERSION: &str = "2.0";

/// Represents a JSON-RPC message that could be either [`Request`], [`Response`]
/// or [`Notification`].
///
/// The shape is determined structurally: `id` + `method` is a request,
/// `id` + (`result` or `error`) is a response, `method` without `id` is a
/// notification. Anything else fails to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// See [`Request`]
    Request(Request),

    /// See [`Response`]
    Response(Response),

    /// See [`Notification`]
    Notification(Notification),
}

/// The structural discriminator of a decoded [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A request expecting a response
    Request,
    /// A response, successful or error
    Response,
    /// A one-way notification
    Notification,
}

/// Parameters for an initialization request sent to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequestParams {
    /// The version of the Model Context Protocol that the client wants to use.
    #[serde(rename = "protocolVersion")]
    pub protocol_ver: String,

    /// The client's capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<ClientCapabilities>,

    /// Information about the client implementation.
    #[serde(rename = "clientInfo", skip_serializing_if = "Option::is_none")]
    pub client_info: Option<Implementation>,
}

/// Result of the initialization request sent to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// The protocol version the server selected.
    #[serde(rename = "protocolVersion")]
    pub protocol_ver: String,

    /// The server's capabilities.
    pub capabilities: ServerCapabilities,

    /// Information about the server implementation.
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,

    /// Optional instructions for using the server and its features.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Describes the name and version of an MCP implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    /// Name of the implementation.
    pub name: String,

    /// Version of the implementation.
    pub version: String,
}

/// Represents the type of role in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Corresponds to the user in the conversation.
    User,
    /// Corresponds to the AI in the conversation.
    Assistant,
}

/// Represents annotations that can be attached to content.
/// Unknown keys are tolerated on decode.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    /// Describes who the intended customer of this object or data is.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audience: Vec<Role>,

    /// The moment the resource was last modified, as an ISO 8601 formatted string.
    #[serde(rename = "lastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    /// Describes how important this data is for operating the server (0 to 1).
    #[serde(default)]
    pub priority: f32,
}

impl Default for Implementation {
    fn default() -> Self {
        Self {
            name: SDK_NAME.into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

impl Message {
    /// Decodes a message from raw bytes and validates the envelope.
    ///
    /// Unrecognizable shapes fail with a parse error; recognizable shapes
    /// violating envelope rules (wrong `jsonrpc`, `null` request id, a
    /// response carrying neither `result` nor `error`) fail with an
    /// invalid-request error.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let msg: Message = serde_json::from_slice(bytes)?;
        msg.validate()?;
        Ok(msg)
    }

    /// Decodes a message from a string slice, see [`Message::from_slice`]
    #[inline]
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Self::from_slice(json.as_bytes())
    }

    /// Encodes the message as a JSON byte vector
    #[inline]
    pub fn to_vec(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(Into::into)
    }

    /// Returns the structural discriminator of this message
    #[inline]
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Request(_) => MessageKind::Request,
            Message::Response(_) => MessageKind::Response,
            Message::Notification(_) => MessageKind::Notification,
        }
    }

    /// Returns `true` if the current message is a [`Request`]
    #[inline]
    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request(_))
    }

    /// Returns `true` if the current message is a [`Response`]
    #[inline]
    pub fn is_response(&self) -> bool {
        matches!(self, Message::Response(_))
    }

    /// Returns `true` if the current message is a [`Notification`]
    #[inline]
    pub fn is_notification(&self) -> bool {
        matches!(self, Message::Notification(_))
    }

    /// Returns the message id; notifications carry none
    #[inline]
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Message::Request(req) => Some(&req.id),
            Message::Response(resp) => Some(&resp.id),
            Message::Notification(_) => None,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        let jsonrpc = match self {
            Message::Request(req) => &req.jsonrpc,
            Message::Response(resp) => &resp.jsonrpc,
            Message::Notification(notification) => &notification.jsonrpc,
        };
        if jsonrpc != JSONRPC_VERSION {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                format!("Unsupported JSON-RPC version: {jsonrpc}")));
        }
        match self {
            Message::Request(req) if req.id == RequestId::Null => Err(Error::new(
                ErrorCode::InvalidRequest,
                "Request id must be a string or an integer")),
            Message::Response(resp) if resp.result.is_none() && resp.error.is_none() => {
                Err(Error::new(
                    ErrorCode::InvalidRequest,
                    "Response must carry either a result or an error"))
            }
            _ => Ok(())
        }
    }
}

impl From<Request> for Message {
    #[inline]
    fn from(req: Request) -> Self {
        Message::Request(req)
    }
}

impl From<Response> for Message {
    #[inline]
    fn from(resp: Response) -> Self {
        Message::Response(resp)
    }
}

impl From<Notification> for Message {
    #[inline]
    fn from(notification: Notification) -> Self {
        Message::Notification(notification)
    }
}
