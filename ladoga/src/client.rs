//! Utilities for the MCP client

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use dashmap::DashMap;
use serde_json::Value;
use tokio::time::timeout;
use crate::commands;
use crate::error::{Error, ErrorCode};
use crate::shared::RequestQueue;
use crate::transport::http::client::HttpClient;
use crate::transport::stdio::StdIoClient;
use crate::types::{
    CallToolRequestParams, CallToolResponse,
    ClientCapabilities, CompleteRequestParams, CompleteResult,
    GetPromptRequestParams, GetPromptResult,
    InitializeRequestParams, InitializeResult,
    ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
    ListToolsResult, Message, ReadResourceRequestParams, ReadResourceResult,
    Request, RequestId, Response,
};
use crate::types::notification::Notification;
use crate::PROTOCOL_VERSIONS;
use self::options::{ClientOptions, TransportKind};

pub mod options;

/// A handler invoked for incoming notifications of one method.
/// Errors and panics inside a handler are logged and swallowed.
pub type NotificationHandler = Arc<
    dyn Fn(Notification)
    + Send
    + Sync
>;

/// The client connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// No transport, or the transport has failed
    Disconnected = 0,
    /// Transport is up, initialize not yet completed
    Connected = 1,
    /// The initialize handshake has completed
    Initialized = 2,
}

impl From<u8> for ConnectionState {
    fn from(state: u8) -> Self {
        match state {
            1 => Self::Connected,
            2 => Self::Initialized,
            _ => Self::Disconnected,
        }
    }
}

enum ClientTransport {
    Stdio(StdIoClient),
    Http(HttpClient),
}

impl ClientTransport {
    async fn send(&self, msg: Message) -> Result<(), Error> {
        match self {
            Self::Stdio(stdio) => stdio.send(msg).await,
            Self::Http(http) => http.send(&msg).await,
        }
    }

    async fn close(&self) {
        match self {
            Self::Stdio(stdio) => stdio.close().await,
            Self::Http(http) => {
                if let Err(_err) = http.terminate().await {
                    tracing::debug!(logger = "ladoga", "Session termination failed: {_err}");
                    http.close();
                }
            }
        }
    }

    fn is_stateless(&self) -> bool {
        match self {
            Self::Stdio(_) => false,
            Self::Http(http) => http.session().is_stateless(),
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            Self::Stdio(stdio) => stdio.is_closed(),
            Self::Http(_) => false,
        }
    }
}

/// Represents an MCP client app
///
/// # Example
/// ```no_run
/// use ladoga::client::Client;
/// use ladoga::error::Error;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Error> {
///     let mut client = Client::new()
///         .with_options(|opt| opt.with_http("http://127.0.0.1:3000/mcp"));
///
///     client.connect().await?;
///
///     let tools = client.list_tools().await?;
///     println!("{} tools", tools.tools.len());
///
///     client.disconnect().await
/// }
/// ```
pub struct Client {
    options: ClientOptions,
    state: Arc<AtomicU8>,
    transport: Option<Arc<ClientTransport>>,
    pending: RequestQueue,
    handlers: Arc<DashMap<String, NotificationHandler>>,
    next_id: AtomicI64,
    server_info: Option<InitializeResult>,
}

impl Default for Client {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Initializes a new client app
    pub fn new() -> Self {
        Self {
            options: ClientOptions::default(),
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected as u8)),
            transport: None,
            pending: RequestQueue::default(),
            handlers: Arc::new(DashMap::new()),
            next_id: AtomicI64::new(1),
            server_info: None,
        }
    }

    /// Configure MCP client options
    pub fn with_options<F>(mut self, config: F) -> Self
    where
        F: FnOnce(ClientOptions) -> ClientOptions
    {
        self.options = config(self.options);
        self
    }

    /// The current connection state
    pub fn state(&self) -> ConnectionState {
        self.state.load(Ordering::Acquire).into()
    }

    /// Whether the server runs without sessions, detected from the
    /// initialize response
    pub fn is_stateless(&self) -> bool {
        self.transport
            .as_deref()
            .map(ClientTransport::is_stateless)
            .unwrap_or(false)
    }

    /// The server's initialize response, once connected
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    /// Registers a handler for incoming notifications of `method`
    pub fn on_notification<F>(&self, method: &str, handler: F)
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        self.handlers.insert(method.into(), Arc::new(handler));
    }

    /// Connects the transport and performs the initialize handshake
    pub async fn connect(&mut self) -> Result<(), Error> {
        if self.transport.is_some() {
            return Err(Error::new(ErrorCode::State, "Client is already connected"));
        }

        let (transport, inbound) = match self.options.transport.clone() {
            TransportKind::Stdio(options) => {
                let (stdio, inbound) = StdIoClient::start(options)?;
                (ClientTransport::Stdio(stdio), inbound)
            }
            TransportKind::Http { url } => {
                let (http, inbound) = HttpClient::new(url, self.options.enable_get_sse);
                (ClientTransport::Http(http), inbound)
            }
            TransportKind::None => {
                return Err(Error::new(
                    ErrorCode::State,
                    "Transport must be configured before connect"));
            }
        };
        self.transport = Some(Arc::new(transport));
        self.state.store(ConnectionState::Connected as u8, Ordering::Release);
        self.spawn_router(inbound);

        match self.init().await {
            Ok(()) => {
                self.state.store(ConnectionState::Initialized as u8, Ordering::Release);
                Ok(())
            }
            Err(err) => {
                self.state.store(ConnectionState::Disconnected as u8, Ordering::Release);
                if let Some(transport) = self.transport.take() {
                    transport.close().await;
                }
                Err(err)
            }
        }
    }

    /// Disconnects from the MCP server, terminating the session on HTTP
    /// and interrupting the child on stdio
    pub async fn disconnect(mut self) -> Result<(), Error> {
        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }
        self.state.store(ConnectionState::Disconnected as u8, Ordering::Release);
        self.pending.fail_all().await;
        Ok(())
    }

    /// Sends `initialize` and `notifications/initialized`
    async fn init(&mut self) -> Result<(), Error> {
        let params = InitializeRequestParams {
            protocol_ver: self.options.protocol_ver().into(),
            capabilities: Some(ClientCapabilities::default()),
            client_info: Some(self.options.implementation.clone()),
        };

        let resp = self
            .send_request(commands::INITIALIZE, Some(serde_json::to_value(params)?))
            .await?;
        let init_result = resp.into_result::<InitializeResult>()?;
        if !PROTOCOL_VERSIONS.contains(&init_result.protocol_ver.as_str()) {
            return Err(Error::new(
                ErrorCode::State,
                format!("Server negotiated an unsupported protocol version: {}",
                    init_result.protocol_ver)));
        }
        self.server_info = Some(init_result);

        self.send_notification(
            crate::types::notification::commands::INITIALIZED,
            None
        ).await
    }

    /// Sends a request and awaits its correlated response.
    /// A timeout invalidates the correlation slot, so a late response is dropped.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<Value>
    ) -> Result<Response, Error> {
        let transport = self.transport()?;
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let receiver = self.pending.push(&id).await;

        let req = Request::new(id.clone(), method, params);
        if let Err(err) = transport.send(req.into()).await {
            let _ = self.pending.pop(&id).await;
            return Err(err);
        }

        match timeout(self.options.request_timeout, receiver).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(Error::new(ErrorCode::State, "Transport is closed")),
            Err(_) => {
                let _ = self.pending.pop(&id).await;
                Err(Error::new(ErrorCode::Timeout, "Request timed out"))
            }
        }
    }

    /// Sends a one-way notification
    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<Value>
    ) -> Result<(), Error> {
        let transport = self.transport()?;
        transport.send(Notification::new(method, params).into()).await
    }

    /// Pings the server
    pub async fn ping(&self) -> Result<(), Error> {
        self.send_request(commands::PING, None)
            .await?
            .into_result::<Value>()
            .map(|_| ())
    }

    /// Requests the list of tools the server provides
    pub async fn list_tools(&self) -> Result<ListToolsResult, Error> {
        self.send_request(crate::types::tool::commands::LIST, None)
            .await?
            .into_result()
    }

    /// Calls a tool
    pub async fn call_tool(&self, params: CallToolRequestParams) -> Result<CallToolResponse, Error> {
        self.send_request(
            crate::types::tool::commands::CALL,
            Some(serde_json::to_value(params)?))
            .await?
            .into_result()
    }

    /// Requests the list of resources the server provides
    pub async fn list_resources(&self) -> Result<ListResourcesResult, Error> {
        self.send_request(crate::types::resource::commands::LIST, None)
            .await?
            .into_result()
    }

    /// Requests the list of resource templates the server provides
    pub async fn list_resource_templates(&self) -> Result<ListResourceTemplatesResult, Error> {
        self.send_request(crate::types::resource::commands::TEMPLATES_LIST, None)
            .await?
            .into_result()
    }

    /// Reads a resource by URI
    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, Error> {
        let params = ReadResourceRequestParams { uri: uri.into() };
        self.send_request(
            crate::types::resource::commands::READ,
            Some(serde_json::to_value(params)?))
            .await?
            .into_result()
    }

    /// Requests the list of prompts the server provides
    pub async fn list_prompts(&self) -> Result<ListPromptsResult, Error> {
        self.send_request(crate::types::prompt::commands::LIST, None)
            .await?
            .into_result()
    }

    /// Expands a prompt
    pub async fn get_prompt(&self, params: GetPromptRequestParams) -> Result<GetPromptResult, Error> {
        self.send_request(
            crate::types::prompt::commands::GET,
            Some(serde_json::to_value(params)?))
            .await?
            .into_result()
    }

    /// Requests completion candidates for a prompt argument
    pub async fn complete(&self, params: CompleteRequestParams) -> Result<CompleteResult, Error> {
        self.send_request(
            crate::types::completion::commands::COMPLETE,
            Some(serde_json::to_value(params)?))
            .await?
            .into_result()
    }

    fn transport(&self) -> Result<&Arc<ClientTransport>, Error> {
        let transport = self.transport
            .as_ref()
            .ok_or_else(|| Error::new(ErrorCode::State, "Client is not connected"))?;
        if self.state() == ConnectionState::Disconnected || transport.is_closed() {
            return Err(Error::new(ErrorCode::State, "Transport is closed"));
        }
        Ok(transport)
    }

    /// Routes inbound messages by structural shape: responses complete the
    /// pending slot by id, notifications go to the per-method handler table.
    fn spawn_router(&self, mut inbound: tokio::sync::mpsc::Receiver<Result<Message, Error>>) {
        let pending = self.pending.clone();
        let handlers = self.handlers.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(item) = inbound.recv().await {
                match item {
                    Ok(Message::Response(resp)) => pending.complete(resp).await,
                    Ok(Message::Notification(notification)) => {
                        let handler = handlers
                            .get(&notification.method)
                            .map(|entry| entry.value().clone());
                        if let Some(handler) = handler {
                            let outcome = std::panic::catch_unwind(
                                AssertUnwindSafe(|| handler(notification)));
                            if outcome.is_err() {
                                tracing::error!(
                                    logger = "ladoga",
                                    "Notification handler panicked");
                            }
                        }
                    }
                    Ok(Message::Request(req)) => {
                        tracing::trace!(
                            logger = "ladoga",
                            method = %req.method,
                            "Ignoring server-initiated request");
                    }
                    Err(_err) => {
                        tracing::error!(logger = "ladoga", "Transport error: {_err}");
                    }
                }
            }
            // The transport is gone: fail outstanding requests and flip the
            // state so further operations fail fast
            pending.fail_all().await;
            state.store(ConnectionState::Disconnected as u8, Ordering::Release);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_starts_disconnected() {
        let client = Client::new();

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_stateless());
        assert!(client.server_info().is_none());
    }

    #[tokio::test]
    async fn it_fails_fast_without_transport() {
        let client = Client::new();

        let err = client.ping().await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::State);
    }

    #[tokio::test]
    async fn it_rejects_connect_without_transport() {
        let mut client = Client::new();

        let err = client.connect().await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::State);
    }

    #[test]
    fn it_converts_connection_states() {
        assert_eq!(ConnectionState::from(0), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::from(1), ConnectionState::Connected);
        assert_eq!(ConnectionState::from(2), ConnectionState::Initialized);
        assert_eq!(ConnectionState::from(9), ConnectionState::Disconnected);
    }
}
