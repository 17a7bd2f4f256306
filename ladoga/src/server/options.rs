//! MCP server configuration options

use std::sync::Arc;
use std::time::Duration;
use axum::http::HeaderMap;
use crate::PROTOCOL_VERSIONS;
use crate::server::context::Context;
use crate::types::{Implementation, Tool};

/// Default page size for paginated listings
const DEFAULT_PAGE_SIZE: usize = 10;

/// Default idle time after which a session is swept
const DEFAULT_SESSION_EXPIRY: Duration = Duration::from_secs(30 * 60);

/// A hook receiving the request context and the full ordered tool list,
/// returning a possibly reordered, possibly smaller sublist.
/// Evaluated on every `tools/list` call, never cached.
pub type ToolListFilter = Arc<
    dyn Fn(&Context, Vec<Tool>) -> Vec<Tool>
    + Send
    + Sync
>;

/// An ordered hook enriching the request context from the HTTP request
/// before dispatch, e.g. header-driven authorization data.
pub type HttpContextFunc = Arc<
    dyn Fn(&mut Context, &HeaderMap)
    + Send
    + Sync
>;

/// Transport the server runs on
#[derive(Debug, Default, Clone)]
pub(crate) enum TransportKind {
    /// Not configured yet
    #[default]
    None,
    /// Serve the current process's stdin/stdout
    Stdio,
    /// Streamable HTTP on the given address
    Http {
        addr: String,
    },
}

/// Represents MCP server configuration options
#[derive(Clone)]
pub struct ServerOptions {
    /// Information about the current server's implementation
    pub(crate) implementation: Implementation,

    /// Optional instructions advertised on initialize
    pub(crate) instructions: Option<String>,

    /// An MCP version that the server prefers
    protocol_ver: Option<&'static str>,

    /// Current transport that the server uses
    pub(crate) transport: TransportKind,

    /// Whether every request gets a throwaway session and no session id is emitted
    pub(crate) stateless: bool,

    /// Whether POST requests may be answered over SSE
    pub(crate) enable_post_sse: bool,

    /// Whether the server-push GET SSE channel is offered
    pub(crate) enable_get_sse: bool,

    /// The MCP endpoint path
    pub(crate) endpoint: String,

    /// Idle time after which the sweep removes a session
    pub(crate) session_expiry: Duration,

    /// Page size for paginated listings
    pub(crate) page_size: usize,

    /// Advertise the tools capability even with an empty registry
    pub(crate) force_tools_capability: bool,

    /// Advertise the resources capability even with an empty registry
    pub(crate) force_resources_capability: bool,

    /// Advertise the prompts capability even with an empty registry
    pub(crate) force_prompts_capability: bool,

    /// The installed tool-list filter, if any
    pub(crate) tool_filter: Option<ToolListFilter>,

    /// The ordered context-function chain run before dispatch
    pub(crate) context_fns: Vec<HttpContextFunc>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            implementation: Implementation::default(),
            instructions: None,
            protocol_ver: None,
            transport: TransportKind::None,
            stateless: false,
            enable_post_sse: true,
            enable_get_sse: true,
            endpoint: "/mcp".into(),
            session_expiry: DEFAULT_SESSION_EXPIRY,
            page_size: DEFAULT_PAGE_SIZE,
            force_tools_capability: false,
            force_resources_capability: false,
            force_prompts_capability: false,
            tool_filter: None,
            context_fns: Vec::new(),
        }
    }
}

impl ServerOptions {
    /// Sets stdio as the transport
    pub fn with_stdio(mut self) -> Self {
        self.transport = TransportKind::Stdio;
        self
    }

    /// Sets streamable HTTP as the transport, bound to `addr`
    pub fn with_http(mut self, addr: impl Into<String>) -> Self {
        self.transport = TransportKind::Http { addr: addr.into() };
        self
    }

    /// Specifies the MCP server name
    pub fn with_name(mut self, name: &str) -> Self {
        self.implementation.name = name.into();
        self
    }

    /// Specifies the MCP server version
    pub fn with_version(mut self, ver: &str) -> Self {
        self.implementation.version = ver.into();
        self
    }

    /// Specifies the instructions advertised on initialize
    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Specifies the preferred Model Context Protocol version
    ///
    /// Default: last supported protocol version
    pub fn with_mcp_version(mut self, ver: &'static str) -> Self {
        self.protocol_ver = Some(ver);
        self
    }

    /// Runs the server in stateless mode: every request synthesizes a
    /// throwaway session and no session id header is emitted
    pub fn with_stateless(mut self) -> Self {
        self.stateless = true;
        self
    }

    /// Enables or disables SSE responses on POST
    ///
    /// Default: enabled
    pub fn with_post_sse(mut self, enabled: bool) -> Self {
        self.enable_post_sse = enabled;
        self
    }

    /// Enables or disables the server-push GET SSE channel
    ///
    /// Default: enabled
    pub fn with_get_sse(mut self, enabled: bool) -> Self {
        self.enable_get_sse = enabled;
        self
    }

    /// Sets the MCP endpoint path
    ///
    /// Default: `/mcp`
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the idle time after which the background sweep removes a session
    pub fn with_session_expiry(mut self, expiry: Duration) -> Self {
        self.session_expiry = expiry;
        self
    }

    /// Sets the page size for paginated listings
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Advertises the tools capability even while the registry is empty
    pub fn with_tools_capability(mut self) -> Self {
        self.force_tools_capability = true;
        self
    }

    /// Advertises the resources capability even while the registry is empty
    pub fn with_resources_capability(mut self) -> Self {
        self.force_resources_capability = true;
        self
    }

    /// Advertises the prompts capability even while the registry is empty
    pub fn with_prompts_capability(mut self) -> Self {
        self.force_prompts_capability = true;
        self
    }

    /// Installs a tool-list filter
    pub fn with_tool_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Context, Vec<Tool>) -> Vec<Tool> + Send + Sync + 'static,
    {
        self.tool_filter = Some(Arc::new(filter));
        self
    }

    /// Appends a context function to the pre-dispatch chain
    pub fn with_http_context<F>(mut self, func: F) -> Self
    where
        F: Fn(&mut Context, &HeaderMap) + Send + Sync + 'static,
    {
        self.context_fns.push(Arc::new(func));
        self
    }

    /// Returns the protocol version the server prefers
    #[inline]
    pub(crate) fn protocol_ver(&self) -> &'static str {
        match self.protocol_ver {
            Some(ver) => ver,
            None => PROTOCOL_VERSIONS[PROTOCOL_VERSIONS.len() - 1],
        }
    }

    /// Selects a version for a client: echo a supported one,
    /// fall back to the server's preferred version otherwise
    pub(crate) fn negotiate_version(&self, client_ver: &str) -> String {
        if PROTOCOL_VERSIONS.contains(&client_ver) {
            client_ver.into()
        } else {
            self.protocol_ver().into()
        }
    }
}
