//! Transports: streamable HTTP and stdio

pub mod http;
pub mod stdio;
