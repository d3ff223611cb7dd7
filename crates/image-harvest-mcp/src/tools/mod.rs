//! MCP tool implementations.

pub mod download_images;
pub mod registry;

pub use registry::{ToolContext, ToolRegistry};
