//! Client and server capability advertisement

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Capabilities a server advertises in its `initialize` response.
///
/// `tools`/`resources`/`prompts` are present iff at least one item is
/// registered; the absence of a capability disables its method family.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Present when the server exposes tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,

    /// Present when the server exposes resources or resource templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,

    /// Present when the server exposes prompts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,

    /// Present when the server emits log message notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,

    /// Experimental, non-standard capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
}

/// Capabilities a client declares in its `initialize` request.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Experimental, non-standard capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
}

/// Tools capability options
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ToolsCapability {
    /// Whether the server emits `notifications/tools/list_changed`.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Resources capability options
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ResourcesCapability {
    /// Whether the server supports `resources/subscribe`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,

    /// Whether the server emits `notifications/resources/list_changed`.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Prompts capability options
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PromptsCapability {
    /// Whether the server emits `notifications/prompts/list_changed`.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Logging capability options
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoggingCapability {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_omits_absent_capabilities() {
        let capabilities = ServerCapabilities {
            tools: Some(ToolsCapability { list_changed: Some(true) }),
            ..Default::default()
        };

        let json = serde_json::to_value(&capabilities).unwrap();

        assert_eq!(json["tools"]["listChanged"], true);
        assert!(json.get("resources").is_none());
        assert!(json.get("prompts").is_none());
    }
}
