//! RPC 层：JSON-RPC 2.0 报文与 MCP stdio 服务器

pub mod protocol;
pub mod server;

pub use server::McpServer;
