//! # Ladoga
//! MCP protocol runtime for Rust: the JSON-RPC message model, the
//! session lifecycle, dispatch, and two interchangeable transports
//! (streamable HTTP with optional SSE, and stdio child process).
//!
//! ## Dependencies
//! ```toml
//! [dependencies]
//! ladoga = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use ladoga::Server;
//! use ladoga::types::{Tool, SchemaProperty, CallToolResponse};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ladoga::error::Error> {
//!     let mut server = Server::new()
//!         .with_options(|opt| opt.with_http("127.0.0.1:3000"));
//!
//!     let tool = Tool::new("greet")
//!         .with_descr("Greets a user")
//!         .with_schema(|schema| schema
//!             .add_property("name", SchemaProperty::string().required()));
//!
//!     server.map_tool(tool, |_ctx, params| async move {
//!         let name = params.arguments()
//!             .get("name")
//!             .and_then(|v| v.as_str().map(String::from))
//!             .unwrap_or_default();
//!         Ok(CallToolResponse::text(format!("Hello, {name}!")))
//!     });
//!
//!     server.run().await
//! }
//! ```

pub use client::Client;
pub use server::{Server, ServerHandle};
pub use server::context::Context;

pub mod client;
pub mod error;
pub mod logging;
pub mod server;
pub mod transport;
pub mod types;

pub(crate) mod commands;
pub(crate) mod shared;

pub(crate) const SDK_NAME: &str = "ladoga";
pub(crate) const PROTOCOL_VERSIONS: [&str; 2] = [
    "2024-11-05",
    "2025-03-26"
];
