//! Represents an MCP server application

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use crate::commands;
use crate::error::{Error, ErrorCode};
use crate::transport;
use crate::types::{
    completion, cursor, resource, tool, prompt,
    CallToolRequestParams, CallToolResponse,
    CompleteRequestParams, CompleteResult,
    GetPromptRequestParams, GetPromptResult,
    InitializeRequestParams, InitializeResult,
    ListPromptsRequestParams, ListPromptsResult,
    ListResourceTemplatesRequestParams, ListResourceTemplatesResult,
    ListResourcesRequestParams, ListResourcesResult,
    ListToolsRequestParams, ListToolsResult,
    LoggingCapability, Prompt, PromptsCapability,
    ReadResourceRequestParams, ReadResourceResult,
    Request, RequestId, Resource, ResourceTemplate, ResourcesCapability,
    Response, ServerCapabilities, SubscribeRequestParams, Tool, ToolsCapability,
};
use crate::types::notification::{
    self as notification_commands,
    CancelledNotificationParams,
    Notification,
    SetLevelRequestParams,
};
use crate::types::response::into_response;
use crate::server::context::Context;
use crate::server::notifications::SseChannels;
use crate::server::options::{ServerOptions, TransportKind};
use crate::server::registry::Registry;
use crate::server::session::{Session, SessionStore, PROTOCOL_VERSION_KEY};

pub mod context;
pub mod notifications;
pub mod options;
pub mod session;
pub(crate) mod registry;

/// An async tool invocation handler
pub(crate) type ToolHandler = Arc<
    dyn Fn(Context, CallToolRequestParams) -> BoxFuture<'static, Result<CallToolResponse, Error>>
    + Send
    + Sync
>;

/// An async resource read handler
pub(crate) type ResourceHandler = Arc<
    dyn Fn(Context, ReadResourceRequestParams) -> BoxFuture<'static, Result<ReadResourceResult, Error>>
    + Send
    + Sync
>;

/// An async prompt expansion handler
pub(crate) type PromptHandler = Arc<
    dyn Fn(Context, GetPromptRequestParams) -> BoxFuture<'static, Result<GetPromptResult, Error>>
    + Send
    + Sync
>;

/// An async completion handler attached to a prompt
pub(crate) type CompletionHandler = Arc<
    dyn Fn(Context, CompleteRequestParams) -> BoxFuture<'static, Result<CompleteResult, Error>>
    + Send
    + Sync
>;

#[derive(Clone)]
pub(crate) struct ToolEntry {
    pub(crate) tool: Tool,
    pub(crate) handler: ToolHandler,
}

#[derive(Clone)]
pub(crate) struct ResourceEntry {
    pub(crate) resource: Resource,
    pub(crate) handler: ResourceHandler,
}

#[derive(Clone)]
pub(crate) struct TemplateEntry {
    pub(crate) template: ResourceTemplate,
    pub(crate) handler: ResourceHandler,
}

#[derive(Clone)]
pub(crate) struct PromptEntry {
    pub(crate) prompt: Prompt,
    pub(crate) handler: PromptHandler,
    pub(crate) completion: Option<CompletionHandler>,
}

type MethodHandler = fn(Arc<ServerCore>, Context, Request) -> BoxFuture<'static, Result<Value, Error>>;

/// Represents an MCP server application.
///
/// Tools, resources and prompts are registered up front; [`Server::run`] or
/// [`Server::serve_http`] then drives the configured transport.
pub struct Server {
    options: ServerOptions,
    tools: Registry<ToolEntry>,
    resources: Registry<ResourceEntry>,
    templates: Registry<TemplateEntry>,
    prompts: Registry<PromptEntry>,
}

impl Default for Server {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Initializes a new server
    pub fn new() -> Self {
        Self {
            options: ServerOptions::default(),
            tools: Registry::new(),
            resources: Registry::new(),
            templates: Registry::new(),
            prompts: Registry::new(),
        }
    }

    /// Configure MCP server options
    pub fn with_options<F>(mut self, config: F) -> Self
    where
        F: FnOnce(ServerOptions) -> ServerOptions
    {
        self.options = config(self.options);
        self
    }

    /// Maps an MCP tool call to a handler function
    ///
    /// # Example
    /// ```no_run
    /// use ladoga::server::Server;
    /// use ladoga::types::{Tool, SchemaProperty, CallToolResponse};
    ///
    /// let mut server = Server::new();
    /// let tool = Tool::new("greet")
    ///     .with_schema(|s| s.add_property("name", SchemaProperty::string().required()));
    ///
    /// server.map_tool(tool, |_ctx, params| async move {
    ///     let name = params.arguments()
    ///         .get("name")
    ///         .and_then(|v| v.as_str().map(String::from))
    ///         .unwrap_or_default();
    ///     Ok(CallToolResponse::text(format!("Hello, {name}!")))
    /// });
    /// ```
    pub fn map_tool<F, Fut>(&mut self, tool: Tool, handler: F) -> &mut Self
    where
        F: Fn(Context, CallToolRequestParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallToolResponse, Error>> + Send + 'static,
    {
        let name = tool.name.clone();
        let handler: ToolHandler = Arc::new(move |ctx, params| Box::pin(handler(ctx, params)));
        self.tools.register(&name, ToolEntry { tool, handler });
        self
    }

    /// Maps a concrete resource URI to a read handler
    pub fn map_resource<F, Fut>(&mut self, resource: Resource, handler: F) -> &mut Self
    where
        F: Fn(Context, ReadResourceRequestParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ReadResourceResult, Error>> + Send + 'static,
    {
        let uri = resource.uri.clone();
        let handler: ResourceHandler = Arc::new(move |ctx, params| Box::pin(handler(ctx, params)));
        self.resources.register(&uri, ResourceEntry { resource, handler });
        self
    }

    /// Maps a resource template to a read handler
    pub fn map_resource_template<F, Fut>(&mut self, template: ResourceTemplate, handler: F) -> &mut Self
    where
        F: Fn(Context, ReadResourceRequestParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ReadResourceResult, Error>> + Send + 'static,
    {
        let key = template.uri_template.clone();
        let handler: ResourceHandler = Arc::new(move |ctx, params| Box::pin(handler(ctx, params)));
        self.templates.register(&key, TemplateEntry { template, handler });
        self
    }

    /// Maps a prompt to an expansion handler
    pub fn map_prompt<F, Fut>(&mut self, prompt: Prompt, handler: F) -> &mut Self
    where
        F: Fn(Context, GetPromptRequestParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<GetPromptResult, Error>> + Send + 'static,
    {
        let name = prompt.name.clone();
        let handler: PromptHandler = Arc::new(move |ctx, params| Box::pin(handler(ctx, params)));
        self.prompts.register(&name, PromptEntry { prompt, handler, completion: None });
        self
    }

    /// Attaches a completion handler to an already-mapped prompt
    pub fn map_completion<F, Fut>(&mut self, prompt_name: &str, handler: F) -> &mut Self
    where
        F: Fn(Context, CompleteRequestParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CompleteResult, Error>> + Send + 'static,
    {
        if let Some(mut entry) = self.prompts.lookup(prompt_name) {
            entry.completion = Some(Arc::new(move |ctx, params| Box::pin(handler(ctx, params))));
            self.prompts.register(prompt_name, entry);
        }
        self
    }

    /// Removes the named tools, returning how many existed
    pub fn unregister_tools<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tools.unregister(names)
    }

    /// Removes the named resources by URI, returning how many existed
    pub fn unregister_resources<I, S>(&mut self, uris: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resources.unregister(uris)
    }

    /// Removes the named prompts, returning how many existed
    pub fn unregister_prompts<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.prompts.unregister(names)
    }

    /// Runs the MCP server on the configured transport until shutdown
    ///
    /// # Example
    /// ```no_run
    /// use ladoga::server::Server;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), ladoga::error::Error> {
    /// let server = Server::new()
    ///     .with_options(|opt| opt.with_stdio());
    ///
    /// // map tools, resources, prompts
    ///
    /// server.run().await
    /// # }
    /// ```
    pub async fn run(self) -> Result<(), Error> {
        match self.options.transport.clone() {
            TransportKind::Stdio => {
                let core = self.into_core();
                let token = CancellationToken::new();
                transport::stdio::serve(core, token).await;
                Ok(())
            }
            TransportKind::Http { .. } => {
                let handle = self.serve_http().await?;
                tokio::signal::ctrl_c()
                    .await
                    .map_err(Error::from)?;
                handle.shutdown();
                Ok(())
            }
            TransportKind::None => Err(Error::new(
                ErrorCode::State,
                "Transport must be configured before run"))
        }
    }

    /// Starts the streamable HTTP transport and returns a handle to the
    /// running server. Useful when the caller owns the shutdown.
    pub async fn serve_http(self) -> Result<ServerHandle, Error> {
        let TransportKind::Http { addr } = self.options.transport.clone() else {
            return Err(Error::new(ErrorCode::State, "HTTP transport is not configured"));
        };
        let core = self.into_core();
        let token = CancellationToken::new();
        core.spawn_housekeeping(token.clone());
        let addr = transport::http::server::serve(core.clone(), &addr, token.clone()).await?;

        tracing::info!(logger = "ladoga", %addr, "Listening: streamable HTTP");
        Ok(ServerHandle { core, addr, token })
    }

    fn into_core(self) -> Arc<ServerCore> {
        Arc::new(ServerCore {
            options: self.options,
            tools: self.tools,
            resources: self.resources,
            templates: self.templates,
            prompts: self.prompts,
            sessions: Arc::new(SessionStore::new()),
            channels: Arc::new(SseChannels::new()),
            subscriptions: DashMap::new(),
            in_flight: DashMap::new(),
            handlers: ServerCore::method_handlers(),
        })
    }
}

/// A handle to a running server: address, shutdown, registry mutation and
/// unsolicited notification fan-out.
pub struct ServerHandle {
    core: Arc<ServerCore>,
    addr: SocketAddr,
    token: CancellationToken,
}

impl ServerHandle {
    /// The address the HTTP transport is bound to
    #[inline]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops the server and cancels every open stream
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Completes when the server has been shut down
    pub async fn closed(&self) {
        self.token.cancelled().await
    }

    /// Ids of every live session
    pub fn active_sessions(&self) -> Vec<Uuid> {
        self.core.sessions.list_active()
    }

    /// Terminates a session, closing its bound GET stream
    pub fn terminate_session(&self, id: &Uuid) -> bool {
        self.core.sessions.terminate(id)
    }

    /// Registers a tool at runtime and announces the list change
    pub async fn add_tool<F, Fut>(&self, tool: Tool, handler: F)
    where
        F: Fn(Context, CallToolRequestParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallToolResponse, Error>> + Send + 'static,
    {
        let name = tool.name.clone();
        let handler: ToolHandler = Arc::new(move |ctx, params| Box::pin(handler(ctx, params)));
        self.core.tools.register(&name, ToolEntry { tool, handler });
        self.broadcast(tool::commands::LIST_CHANGED, None).await;
    }

    /// Removes tools at runtime, announcing the change when any existed
    pub async fn remove_tools<I, S>(&self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed = self.core.tools.unregister(names);
        if removed > 0 {
            self.broadcast(tool::commands::LIST_CHANGED, None).await;
        }
        removed
    }

    /// Registers a resource at runtime and announces the list change
    pub async fn add_resource<F, Fut>(&self, resource: Resource, handler: F)
    where
        F: Fn(Context, ReadResourceRequestParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ReadResourceResult, Error>> + Send + 'static,
    {
        let uri = resource.uri.clone();
        let handler: ResourceHandler = Arc::new(move |ctx, params| Box::pin(handler(ctx, params)));
        self.core.resources.register(&uri, ResourceEntry { resource, handler });
        self.broadcast(resource::commands::LIST_CHANGED, None).await;
    }

    /// Removes resources at runtime, announcing the change when any existed
    pub async fn remove_resources<I, S>(&self, uris: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed = self.core.resources.unregister(uris);
        if removed > 0 {
            self.broadcast(resource::commands::LIST_CHANGED, None).await;
        }
        removed
    }

    /// Registers a prompt at runtime and announces the list change
    pub async fn add_prompt<F, Fut>(&self, prompt: Prompt, handler: F)
    where
        F: Fn(Context, GetPromptRequestParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<GetPromptResult, Error>> + Send + 'static,
    {
        let name = prompt.name.clone();
        let handler: PromptHandler = Arc::new(move |ctx, params| Box::pin(handler(ctx, params)));
        self.core.prompts.register(&name, PromptEntry { prompt, handler, completion: None });
        self.broadcast(prompt::commands::LIST_CHANGED, None).await;
    }

    /// Removes prompts at runtime, announcing the change when any existed
    pub async fn remove_prompts<I, S>(&self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed = self.core.prompts.unregister(names);
        if removed > 0 {
            self.broadcast(prompt::commands::LIST_CHANGED, None).await;
        }
        removed
    }

    /// Delivers a notification to one session's GET stream.
    /// Dropped when the session has no open stream.
    pub async fn notify_session(&self, id: &Uuid, method: &str, params: Option<Value>) -> bool {
        self.core.channels.notify(id, Notification::new(method, params)).await
    }

    /// Fans a notification out to every session with an open GET stream
    pub async fn broadcast(&self, method: &str, params: Option<Value>) {
        self.core.channels.broadcast(Notification::new(method, params)).await
    }

    /// Fans a notification out to the sessions passing the predicate
    pub async fn broadcast_filtered<F>(&self, filter: F, method: &str, params: Option<Value>)
    where
        F: Fn(&Uuid) -> bool,
    {
        self.core.channels
            .broadcast_filtered(filter, Notification::new(method, params))
            .await
    }

    /// Notifies the sessions subscribed to `uri` that the resource changed
    pub async fn resource_updated(&self, uri: &str) {
        let subscribed: Vec<Uuid> = self.core.subscriptions
            .iter()
            .filter(|entry| entry.value().contains(uri))
            .map(|entry| *entry.key())
            .collect();
        let params = json!({ "uri": uri });
        for id in subscribed {
            self.core.channels
                .notify(&id, Notification::new(resource::commands::UPDATED, Some(params.clone())))
                .await;
        }
    }
}

/// The runtime state shared by every transport: options, registries,
/// sessions, channels and the dispatch table.
pub(crate) struct ServerCore {
    pub(crate) options: ServerOptions,
    pub(crate) tools: Registry<ToolEntry>,
    pub(crate) resources: Registry<ResourceEntry>,
    pub(crate) templates: Registry<TemplateEntry>,
    pub(crate) prompts: Registry<PromptEntry>,
    pub(crate) sessions: Arc<SessionStore>,
    pub(crate) channels: Arc<SseChannels>,
    subscriptions: DashMap<Uuid, HashSet<String>>,
    in_flight: DashMap<(Uuid, RequestId), CancellationToken>,
    handlers: HashMap<&'static str, MethodHandler>,
}

impl ServerCore {
    fn method_handlers() -> HashMap<&'static str, MethodHandler> {
        let mut handlers: HashMap<&'static str, MethodHandler> = HashMap::new();
        handlers.insert(commands::INITIALIZE, |core, ctx, req| Box::pin(Self::init(core, ctx, req)));
        handlers.insert(commands::PING, |core, ctx, req| Box::pin(Self::ping(core, ctx, req)));

        handlers.insert(tool::commands::LIST, |core, ctx, req| Box::pin(Self::tools(core, ctx, req)));
        handlers.insert(tool::commands::CALL, |core, ctx, req| Box::pin(Self::tool(core, ctx, req)));

        handlers.insert(resource::commands::LIST, |core, ctx, req| Box::pin(Self::resources(core, ctx, req)));
        handlers.insert(resource::commands::TEMPLATES_LIST, |core, ctx, req| Box::pin(Self::resource_templates(core, ctx, req)));
        handlers.insert(resource::commands::READ, |core, ctx, req| Box::pin(Self::resource(core, ctx, req)));
        handlers.insert(resource::commands::SUBSCRIBE, |core, ctx, req| Box::pin(Self::resource_subscribe(core, ctx, req)));
        handlers.insert(resource::commands::UNSUBSCRIBE, |core, ctx, req| Box::pin(Self::resource_unsubscribe(core, ctx, req)));

        handlers.insert(prompt::commands::LIST, |core, ctx, req| Box::pin(Self::prompts(core, ctx, req)));
        handlers.insert(prompt::commands::GET, |core, ctx, req| Box::pin(Self::prompt(core, ctx, req)));
        handlers.insert(completion::commands::COMPLETE, |core, ctx, req| Box::pin(Self::completion(core, ctx, req)));

        handlers.insert(notification_commands::commands::SET_LOG_LEVEL, |core, ctx, req| Box::pin(Self::set_log_level(core, ctx, req)));
        handlers
    }

    /// Synthesizes the throwaway, already-initialized session of one
    /// stateless request
    pub(crate) fn stateless_session(&self) -> Arc<Session> {
        let session = Session::new();
        session.set_initialized();
        Arc::new(session)
    }

    /// Routes one request through the dispatch table and converts the
    /// outcome into a response. Handler panics become internal errors.
    pub(crate) async fn dispatch_request(self: &Arc<Self>, ctx: Context, req: Request) -> Response {
        let id = req.id.clone();
        tracing::trace!(logger = "ladoga", method = %req.method, request_id = %id, "Received request");

        if !self.options.stateless
            && !ctx.session().is_initialized()
            && req.method != commands::INITIALIZE
            && req.method != commands::PING
        {
            return Response::error(id, Error::new(
                ErrorCode::InvalidRequest,
                "Session is not initialized"));
        }
        if let Err(err) = self.check_capability(&req.method) {
            return Response::error(id, err);
        }
        let Some(handler) = self.handlers.get(req.method.as_str()).copied() else {
            return Response::error(id, Error::from(ErrorCode::MethodNotFound));
        };

        let token = ctx.cancellation_token();
        let key = (ctx.session_id(), id.clone());
        self.in_flight.insert(key.clone(), token.clone());

        let outcome = tokio::select! {
            outcome = AssertUnwindSafe(handler(self.clone(), ctx, req)).catch_unwind() => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(Error::new(ErrorCode::InternalError, "Handler panicked")),
                }
            }
            _ = token.cancelled() => {
                tracing::debug!(logger = "ladoga", request_id = %id, "The request has been cancelled");
                Err(Error::from(ErrorCode::RequestCancelled))
            }
        };
        self.in_flight.remove(&key);

        into_response(outcome, id)
    }

    /// Routes one notification. Unrecognized methods are silently dropped.
    pub(crate) async fn dispatch_notification(self: &Arc<Self>, ctx: Context, notification: Notification) {
        match notification.method.as_str() {
            notification_commands::commands::INITIALIZED => {
                ctx.session().set_initialized();
            }
            notification_commands::commands::CANCELLED => {
                match notification.parse_params::<CancelledNotificationParams>() {
                    Ok(params) => self.cancel_request(ctx.session_id(), &params.request_id),
                    Err(err) => tracing::debug!(
                        logger = "ladoga",
                        "Malformed cancellation params: {err}"),
                }
            }
            method => tracing::trace!(
                logger = "ladoga",
                %method,
                "Dropped unrecognized notification"),
        }
    }

    /// Cancels an in-flight request of `session_id`; unknown ids are ignored
    pub(crate) fn cancel_request(&self, session_id: Uuid, request_id: &RequestId) {
        if let Some(entry) = self.in_flight.get(&(session_id, request_id.clone())) {
            entry.value().cancel();
        }
    }

    /// Spawns the expiry sweeper and the session-teardown listener
    pub(crate) fn spawn_housekeeping(self: &Arc<Self>, token: CancellationToken) {
        if self.options.stateless {
            return;
        }
        tokio::spawn(self.sessions
            .clone()
            .run_sweeper(self.options.session_expiry, token.clone()));

        let core = self.clone();
        tokio::spawn(async move {
            let mut events = core.sessions.subscribe_terminated();
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(session_id) => core.session_closed(&session_id),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
    }

    fn session_closed(&self, id: &Uuid) {
        self.channels.close(id);
        self.subscriptions.remove(id);
        let keys: Vec<(Uuid, RequestId)> = self.in_flight
            .iter()
            .filter(|entry| entry.key().0 == *id)
            .map(|entry| entry.key().clone())
            .collect();
        for key in keys {
            if let Some((_, token)) = self.in_flight.remove(&key) {
                token.cancel();
            }
        }
    }

    fn tools_enabled(&self) -> bool {
        self.options.force_tools_capability || !self.tools.is_empty()
    }

    fn resources_enabled(&self) -> bool {
        self.options.force_resources_capability
            || !self.resources.is_empty()
            || !self.templates.is_empty()
    }

    fn prompts_enabled(&self) -> bool {
        self.options.force_prompts_capability || !self.prompts.is_empty()
    }

    /// A method family is dispatchable only while its capability is live
    fn check_capability(&self, method: &str) -> Result<(), Error> {
        let enabled = if method.starts_with("tools/") {
            self.tools_enabled()
        } else if method.starts_with("resources/") {
            self.resources_enabled()
        } else if method.starts_with("prompts/") || method == completion::commands::COMPLETE {
            self.prompts_enabled()
        } else {
            true
        };
        if enabled {
            Ok(())
        } else {
            Err(Error::from(ErrorCode::MethodNotFound))
        }
    }

    /// Derives capabilities from the registries, evaluated per initialize
    fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: self.tools_enabled().then(|| ToolsCapability {
                list_changed: Some(true),
            }),
            resources: self.resources_enabled().then(|| ResourcesCapability {
                subscribe: Some(true),
                list_changed: Some(true),
            }),
            prompts: self.prompts_enabled().then(|| PromptsCapability {
                list_changed: Some(true),
            }),
            logging: Some(LoggingCapability::default()),
            experimental: None,
        }
    }

    /// Connection initialization handler
    async fn init(core: Arc<ServerCore>, ctx: Context, req: Request) -> Result<Value, Error> {
        let params: InitializeRequestParams = req.parse_params()?;
        let protocol_ver = core.options.negotiate_version(&params.protocol_ver);
        ctx.session().set_value(PROTOCOL_VERSION_KEY, Value::String(protocol_ver.clone()));

        let result = InitializeResult {
            protocol_ver,
            capabilities: core.capabilities(),
            server_info: core.options.implementation.clone(),
            instructions: core.options.instructions.clone(),
        };
        to_value(result)
    }

    /// Ping request handler
    async fn ping(_core: Arc<ServerCore>, _ctx: Context, _req: Request) -> Result<Value, Error> {
        Ok(json!({}))
    }

    /// Tools listing handler: filter first, then paginate
    async fn tools(core: Arc<ServerCore>, ctx: Context, req: Request) -> Result<Value, Error> {
        let params: ListToolsRequestParams = req.parse_params()?;
        let tools: Vec<Tool> = core.tools
            .list()
            .into_iter()
            .map(|entry| entry.tool)
            .collect();
        let tools = match &core.options.tool_filter {
            Some(filter) => filter(&ctx, tools),
            None => tools,
        };
        let page = cursor::paginate(tools, params.cursor.as_ref(), core.options.page_size);
        to_value(ListToolsResult {
            tools: page.items,
            next_cursor: page.next_cursor,
        })
    }

    /// A tool call request handler
    async fn tool(core: Arc<ServerCore>, ctx: Context, req: Request) -> Result<Value, Error> {
        let params: CallToolRequestParams = req.parse_params()?;
        match core.tools.lookup(&params.name) {
            Some(entry) => to_value((entry.handler)(ctx, params).await?),
            None => Err(Error::new(ErrorCode::InvalidParams, "Tool not found")),
        }
    }

    /// Resources listing handler
    async fn resources(core: Arc<ServerCore>, _ctx: Context, req: Request) -> Result<Value, Error> {
        let params: ListResourcesRequestParams = req.parse_params()?;
        let resources: Vec<Resource> = core.resources
            .list()
            .into_iter()
            .map(|entry| entry.resource)
            .collect();
        let page = cursor::paginate(resources, params.cursor.as_ref(), core.options.page_size);
        to_value(ListResourcesResult {
            resources: page.items,
            next_cursor: page.next_cursor,
        })
    }

    /// Resource templates listing handler
    async fn resource_templates(core: Arc<ServerCore>, _ctx: Context, req: Request) -> Result<Value, Error> {
        let params: ListResourceTemplatesRequestParams = req.parse_params()?;
        let templates: Vec<ResourceTemplate> = core.templates
            .list()
            .into_iter()
            .map(|entry| entry.template)
            .collect();
        let page = cursor::paginate(templates, params.cursor.as_ref(), core.options.page_size);
        to_value(ListResourceTemplatesResult {
            templates: page.items,
            next_cursor: page.next_cursor,
        })
    }

    /// A read resource request handler: exact URI first, templates second
    async fn resource(core: Arc<ServerCore>, ctx: Context, req: Request) -> Result<Value, Error> {
        let params: ReadResourceRequestParams = req.parse_params()?;
        if let Some(entry) = core.resources.lookup(&params.uri) {
            return to_value((entry.handler)(ctx, params).await?);
        }
        for entry in core.templates.list() {
            if entry.template.match_uri(&params.uri).is_some() {
                return to_value((entry.handler)(ctx, params).await?);
            }
        }
        Err(Error::new(ErrorCode::InvalidParams, "Resource not found"))
    }

    /// A resource subscription request handler
    async fn resource_subscribe(core: Arc<ServerCore>, ctx: Context, req: Request) -> Result<Value, Error> {
        let params: SubscribeRequestParams = req.parse_params()?;
        if !core.resource_exists(&params.uri) {
            return Err(Error::new(ErrorCode::InvalidParams, "Resource not found"));
        }
        core.subscriptions
            .entry(ctx.session_id())
            .or_default()
            .insert(params.uri);
        Ok(json!({}))
    }

    /// A resource unsubscription request handler
    async fn resource_unsubscribe(core: Arc<ServerCore>, ctx: Context, req: Request) -> Result<Value, Error> {
        let params: SubscribeRequestParams = req.parse_params()?;
        if let Some(mut subscriptions) = core.subscriptions.get_mut(&ctx.session_id()) {
            subscriptions.remove(&params.uri);
        }
        Ok(json!({}))
    }

    /// Prompts listing handler
    async fn prompts(core: Arc<ServerCore>, _ctx: Context, req: Request) -> Result<Value, Error> {
        let params: ListPromptsRequestParams = req.parse_params()?;
        let prompts: Vec<Prompt> = core.prompts
            .list()
            .into_iter()
            .map(|entry| entry.prompt)
            .collect();
        let page = cursor::paginate(prompts, params.cursor.as_ref(), core.options.page_size);
        to_value(ListPromptsResult {
            prompts: page.items,
            next_cursor: page.next_cursor,
        })
    }

    /// A get prompt request handler
    async fn prompt(core: Arc<ServerCore>, ctx: Context, req: Request) -> Result<Value, Error> {
        let params: GetPromptRequestParams = req.parse_params()?;
        let Some(entry) = core.prompts.lookup(&params.name) else {
            return Err(Error::new(ErrorCode::InvalidParams, "Prompt not found"));
        };
        let supplied = params.arguments();
        for arg in &entry.prompt.arguments {
            if arg.required == Some(true) && !supplied.contains_key(&arg.name) {
                return Err(Error::new(
                    ErrorCode::InvalidParams,
                    format!("Missing required argument: {}", arg.name)));
            }
        }
        to_value((entry.handler)(ctx, params).await?)
    }

    /// Completion request handler, routed to the prompt registry.
    /// Prompts without a completion handler answer with no candidates.
    async fn completion(core: Arc<ServerCore>, ctx: Context, req: Request) -> Result<Value, Error> {
        let params: CompleteRequestParams = req.parse_params()?;
        let handler = params.r#ref.name
            .as_deref()
            .and_then(|name| core.prompts.lookup(name))
            .and_then(|entry| entry.completion);
        match handler {
            Some(handler) => to_value(handler(ctx, params).await?),
            None => to_value(CompleteResult::default()),
        }
    }

    /// Stores the requested logging level in the session
    async fn set_log_level(_core: Arc<ServerCore>, ctx: Context, req: Request) -> Result<Value, Error> {
        let params: SetLevelRequestParams = req.parse_params()?;
        ctx.session().set_value("logLevel", serde_json::to_value(params.level)?);
        Ok(json!({}))
    }

    fn resource_exists(&self, uri: &str) -> bool {
        self.resources.lookup(uri).is_some()
            || self.templates
                .list()
                .iter()
                .any(|entry| entry.template.match_uri(uri).is_some())
    }
}

#[inline]
fn to_value<T: serde::Serialize>(value: T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SchemaProperty;

    fn test_core(server: Server) -> Arc<ServerCore> {
        server.into_core()
    }

    fn greet_server() -> Server {
        let mut server = Server::new();
        let tool = Tool::new("greet")
            .with_schema(|schema| schema
                .add_property("name", SchemaProperty::string().required()));
        server.map_tool(tool, |_ctx, params| async move {
            let name = params.arguments()
                .get("name")
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default();
            Ok(CallToolResponse::text(format!("Hello, {name}!")))
        });
        server
    }

    fn initialized_ctx(core: &Arc<ServerCore>) -> Context {
        let session = core.sessions.create();
        session.set_initialized();
        Context::new(session)
    }

    #[tokio::test]
    async fn it_dispatches_a_tool_call() {
        let core = test_core(greet_server());
        let ctx = initialized_ctx(&core);

        let req = Request::new(1, tool::commands::CALL, Some(json!({
            "name": "greet",
            "arguments": { "name": "MCP User" }
        })));
        let resp = core.dispatch_request(ctx, req).await;

        let result = resp.result.unwrap();
        assert_eq!(result["content"][0]["type"], "text");
        assert_eq!(result["content"][0]["text"], "Hello, MCP User!");
    }

    #[tokio::test]
    async fn it_disables_method_families_without_registrations() {
        let core = test_core(greet_server());
        let ctx = initialized_ctx(&core);

        let resp = core
            .dispatch_request(ctx, Request::new(1, prompt::commands::LIST, None))
            .await;

        assert_eq!(resp.error.unwrap().code, ErrorCode::MethodNotFound);
    }

    #[tokio::test]
    async fn it_returns_empty_list_when_capability_is_forced() {
        let server = Server::new()
            .with_options(|opt| opt.with_tools_capability());
        let core = test_core(server);
        let ctx = initialized_ctx(&core);

        let resp = core
            .dispatch_request(ctx, Request::new(1, tool::commands::LIST, None))
            .await;

        assert_eq!(resp.result.unwrap()["tools"], json!([]));
    }

    #[tokio::test]
    async fn it_negotiates_protocol_version() {
        let core = test_core(greet_server());

        let params = json!({
            "protocolVersion": "2024-11-05",
            "clientInfo": { "name": "test", "version": "0" }
        });
        let ctx = Context::new(core.sessions.create());
        let resp = core
            .dispatch_request(ctx.clone(), Request::new(1, commands::INITIALIZE, Some(params)))
            .await;

        assert_eq!(resp.result.unwrap()["protocolVersion"], "2024-11-05");
        assert_eq!(ctx.session().protocol_ver().as_deref(), Some("2024-11-05"));

        let params = json!({ "protocolVersion": "1990-01-01" });
        let resp = core
            .dispatch_request(ctx, Request::new(2, commands::INITIALIZE, Some(params)))
            .await;

        assert_eq!(
            resp.result.unwrap()["protocolVersion"],
            *crate::PROTOCOL_VERSIONS.last().unwrap());
    }

    #[tokio::test]
    async fn it_rejects_requests_before_initialized() {
        let core = test_core(greet_server());
        let ctx = Context::new(core.sessions.create());

        let resp = core
            .dispatch_request(ctx, Request::new(1, tool::commands::LIST, None))
            .await;

        assert_eq!(resp.error.unwrap().code, ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn it_flips_initialized_on_notification() {
        let core = test_core(greet_server());
        let ctx = Context::new(core.sessions.create());

        core.dispatch_notification(
            ctx.clone(),
            Notification::new(notification_commands::commands::INITIALIZED, None))
            .await;

        assert!(ctx.session().is_initialized());
    }

    #[tokio::test]
    async fn it_lists_tools_in_registration_order_with_filter() {
        let mut server = Server::new();
        for name in ["calculator", "weather", "admin_panel"] {
            server.map_tool(Tool::new(name), |_ctx, _params| async move {
                Ok(CallToolResponse::text("ok"))
            });
        }
        let server = server.with_options(|opt| opt.with_tool_filter(|ctx, tools| {
            match ctx.value("user_role").and_then(|v| v.as_str()) {
                Some("admin") => tools,
                Some("user") => tools
                    .into_iter()
                    .filter(|t| t.name == "calculator" || t.name == "weather")
                    .collect(),
                _ => tools
                    .into_iter()
                    .filter(|t| t.name == "calculator")
                    .collect(),
            }
        }));
        let core = test_core(server);

        let mut ctx = initialized_ctx(&core);
        ctx.set_value("user_role", "user");
        let resp = core
            .dispatch_request(ctx, Request::new(1, tool::commands::LIST, None))
            .await;

        let tools = resp.result.unwrap();
        let names: Vec<&str> = tools["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["calculator", "weather"]);
    }

    #[tokio::test]
    async fn it_reads_resources_through_templates() {
        let mut server = Server::new();
        server.map_resource_template(
            ResourceTemplate::new("res://docs/{name}", "doc"),
            |_ctx, params| async move {
                Ok(crate::types::ResourceContents::text(&params.uri, "text/plain", "content").into())
            });
        let core = test_core(server);
        let ctx = initialized_ctx(&core);

        let resp = core
            .dispatch_request(ctx, Request::new(1, resource::commands::READ, Some(json!({
                "uri": "res://docs/readme"
            }))))
            .await;

        let result = resp.result.unwrap();
        assert_eq!(result["contents"][0]["uri"], "res://docs/readme");
        assert_eq!(result["contents"][0]["text"], "content");
    }

    #[tokio::test]
    async fn it_rejects_unknown_tool_with_invalid_params() {
        let core = test_core(greet_server());
        let ctx = initialized_ctx(&core);

        let resp = core
            .dispatch_request(ctx, Request::new(1, tool::commands::CALL, Some(json!({
                "name": "ghost"
            }))))
            .await;

        assert_eq!(resp.error.unwrap().code, ErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn it_turns_handler_panics_into_internal_errors() {
        let mut server = Server::new();
        server.map_tool(Tool::new("boom"), |_ctx, _params| async move {
            panic!("tool exploded");
            #[allow(unreachable_code)]
            Ok(CallToolResponse::text(""))
        });
        let core = test_core(server);
        let ctx = initialized_ctx(&core);

        let resp = core
            .dispatch_request(ctx, Request::new(1, tool::commands::CALL, Some(json!({
                "name": "boom"
            }))))
            .await;

        assert_eq!(resp.error.unwrap().code, ErrorCode::InternalError);
    }

    #[tokio::test]
    async fn it_answers_completion_with_empty_values_by_default() {
        let mut server = Server::new();
        server.map_prompt(Prompt::new("analyze"), |_ctx, _params| async move {
            Ok(vec![crate::types::PromptMessage::user("hi")].into())
        });
        let core = test_core(server);
        let ctx = initialized_ctx(&core);

        let resp = core
            .dispatch_request(ctx, Request::new(1, completion::commands::COMPLETE, Some(json!({
                "ref": { "type": "ref/prompt", "name": "analyze" },
                "argument": { "name": "lang", "value": "p" }
            }))))
            .await;

        assert_eq!(resp.result.unwrap()["completion"]["values"], json!([]));
    }

    #[tokio::test]
    async fn it_requires_declared_prompt_arguments() {
        let mut server = Server::new();
        server.map_prompt(
            Prompt::new("analyze").with_arg("lang", "language", true),
            |_ctx, _params| async move {
                Ok(vec![crate::types::PromptMessage::user("hi")].into())
            });
        let core = test_core(server);
        let ctx = initialized_ctx(&core);

        let resp = core
            .dispatch_request(ctx, Request::new(1, prompt::commands::GET, Some(json!({
                "name": "analyze"
            }))))
            .await;

        assert_eq!(resp.error.unwrap().code, ErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn it_drops_the_tools_capability_on_the_next_initialize() {
        let mut server = greet_server();
        assert_eq!(server.unregister_tools(["greet"]), 1);
        let core = test_core(server);
        let ctx = Context::new(core.sessions.create());

        let resp = core
            .dispatch_request(ctx.clone(), Request::new(1, commands::INITIALIZE, Some(json!({
                "protocolVersion": "2025-03-26"
            }))))
            .await;
        let result = resp.result.unwrap();
        assert!(result["capabilities"].get("tools").is_none());

        core.dispatch_notification(
            ctx.clone(),
            Notification::new(notification_commands::commands::INITIALIZED, None))
            .await;
        let resp = core
            .dispatch_request(ctx, Request::new(2, tool::commands::LIST, None))
            .await;
        assert_eq!(resp.error.unwrap().code, ErrorCode::MethodNotFound);
    }

    #[tokio::test]
    async fn it_cancels_in_flight_requests() {
        let mut server = Server::new();
        server.map_tool(Tool::new("slow"), |_ctx, _params| async move {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok(CallToolResponse::text("never"))
        });
        let core = test_core(server);
        let ctx = initialized_ctx(&core);
        let session_id = ctx.session_id();

        let core2 = core.clone();
        let dispatch = tokio::spawn(async move {
            core2.dispatch_request(ctx, Request::new(9, tool::commands::CALL, Some(json!({
                "name": "slow"
            })))).await
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        core.cancel_request(session_id, &RequestId::Number(9));

        let resp = dispatch.await.unwrap();
        assert_eq!(resp.error.unwrap().code, ErrorCode::RequestCancelled);
    }
}
