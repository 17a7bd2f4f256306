//! MCP client configuration options

use std::time::Duration;
use crate::PROTOCOL_VERSIONS;
use crate::transport::stdio::StdIoOptions;
use crate::types::Implementation;

/// Default bound on each outstanding request
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport the client connects over
#[derive(Debug, Default, Clone)]
pub(crate) enum TransportKind {
    /// Not configured yet
    #[default]
    None,
    /// Spawn a server child process over stdio
    Stdio(StdIoOptions),
    /// Streamable HTTP against the given MCP endpoint URL
    Http {
        url: String,
    },
}

/// Represents MCP client configuration options
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Information about the current client's implementation
    pub(crate) implementation: Implementation,

    /// An MCP version that the client prefers
    protocol_ver: Option<&'static str>,

    /// Current transport that the client uses
    pub(crate) transport: TransportKind,

    /// Bound on each outstanding request
    pub(crate) request_timeout: Duration,

    /// Whether the background GET SSE stream is opened after initialize
    pub(crate) enable_get_sse: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            implementation: Implementation::default(),
            protocol_ver: None,
            transport: TransportKind::None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            enable_get_sse: true,
        }
    }
}

impl ClientOptions {
    /// Connects over stdio by spawning `command` with `args`
    pub fn with_stdio<I, S>(mut self, command: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transport = TransportKind::Stdio(StdIoOptions::new(command, args));
        self
    }

    /// Connects over stdio with fully specified child options
    pub fn with_stdio_options(mut self, options: StdIoOptions) -> Self {
        self.transport = TransportKind::Stdio(options);
        self
    }

    /// Connects over streamable HTTP to the MCP endpoint `url`
    pub fn with_http(mut self, url: impl Into<String>) -> Self {
        self.transport = TransportKind::Http { url: url.into() };
        self
    }

    /// Specifies the MCP client name
    pub fn with_name(mut self, name: &str) -> Self {
        self.implementation.name = name.into();
        self
    }

    /// Specifies the MCP client version
    pub fn with_version(mut self, ver: &str) -> Self {
        self.implementation.version = ver.into();
        self
    }

    /// Specifies the preferred Model Context Protocol version
    pub fn with_mcp_version(mut self, ver: &'static str) -> Self {
        self.protocol_ver = Some(ver);
        self
    }

    /// Bounds each outstanding request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enables or disables the background GET SSE stream
    ///
    /// Default: enabled
    pub fn with_get_sse(mut self, enabled: bool) -> Self {
        self.enable_get_sse = enabled;
        self
    }

    /// Returns the protocol version the client prefers
    #[inline]
    pub(crate) fn protocol_ver(&self) -> &'static str {
        match self.protocol_ver {
            Some(ver) => ver,
            None => PROTOCOL_VERSIONS[PROTOCOL_VERSIONS.len() - 1],
        }
    }
}
