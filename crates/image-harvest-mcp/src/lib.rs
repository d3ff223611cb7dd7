//! Image Harvest MCP server. Exposes `download_images` to LLM clients.

pub mod config;
pub mod protocol;
pub mod tools;
pub mod transport;
pub mod types;

pub use config::{resolve_output_root, ServerOptions};
pub use protocol::ProtocolHandler;
pub use transport::StdioTransport;
