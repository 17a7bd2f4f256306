//! Represents an MCP prompt template

use serde::{Deserialize, Serialize};
use crate::types::{Content, Cursor, Role};

/// List of commands for Prompts
pub mod commands {
    pub const LIST: &str = "prompts/list";
    pub const GET: &str = "prompts/get";
    pub const LIST_CHANGED: &str = "notifications/prompts/list_changed";
}

/// A prompt template the server can expand into a message list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// The name of the prompt. Unique key.
    pub name: String,

    /// A human-readable description of the prompt.
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub descr: Option<String>,

    /// Arguments the template accepts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

/// One named argument of a [`Prompt`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// The argument name.
    pub name: String,

    /// A human-readable description of the argument.
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub descr: Option<String>,

    /// Whether the argument must be supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// One message of an expanded prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Who speaks the message.
    pub role: Role,

    /// The message content.
    pub content: Content,
}

impl Prompt {
    /// Creates a new [`Prompt`]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            descr: None,
            arguments: Vec::new(),
        }
    }

    /// Sets the description
    pub fn with_descr(mut self, descr: &str) -> Self {
        self.descr = Some(descr.into());
        self
    }

    /// Declares an argument
    pub fn with_arg(mut self, name: &str, descr: &str, required: bool) -> Self {
        self.arguments.push(PromptArgument {
            name: name.into(),
            descr: Some(descr.into()),
            required: Some(required),
        });
        self
    }
}

impl PromptMessage {
    /// Creates a user message
    pub fn user(content: impl Into<Content>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// Creates an assistant message
    pub fn assistant(content: impl Into<Content>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Sent from the client to request a list of prompts the server has.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListPromptsRequestParams {
    /// An opaque token representing the current pagination position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// A response to a `prompts/list` request.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListPromptsResult {
    /// Prompts in registration order
    pub prompts: Vec<Prompt>,

    /// Token of the next page, absent on the last one
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// Params of a `prompts/get` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptRequestParams {
    /// The prompt name.
    pub name: String,

    /// Named argument values.
    #[serde(rename = "arguments", skip_serializing_if = "Option::is_none")]
    pub args: Option<std::collections::HashMap<String, String>>,
}

impl GetPromptRequestParams {
    /// Creates params for prompt `name`
    pub fn new(name: &str) -> Self {
        Self { name: name.into(), args: None }
    }

    /// Adds an argument value
    pub fn with_arg(mut self, name: &str, value: &str) -> Self {
        self.args
            .get_or_insert_with(Default::default)
            .insert(name.into(), value.into());
        self
    }

    /// Returns the arguments, substituting an empty map when absent
    #[inline]
    pub fn arguments(&self) -> std::collections::HashMap<String, String> {
        self.args
            .clone()
            .unwrap_or_default()
    }
}

/// A response to a `prompts/get` request.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetPromptResult {
    /// An optional description of the expanded prompt.
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub descr: Option<String>,

    /// The expanded messages.
    pub messages: Vec<PromptMessage>,
}

impl From<Vec<PromptMessage>> for GetPromptResult {
    #[inline]
    fn from(messages: Vec<PromptMessage>) -> Self {
        Self { descr: None, messages }
    }
}

impl From<PromptMessage> for GetPromptResult {
    #[inline]
    fn from(message: PromptMessage) -> Self {
        Self { descr: None, messages: vec![message] }
    }
}
