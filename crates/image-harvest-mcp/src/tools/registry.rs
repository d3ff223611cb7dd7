//! Tool registration and dispatch.

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use image_harvest::{Harvester, ProgressSink};

use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

use super::download_images;

/// What a tool call gets to work with besides its arguments.
pub struct ToolContext<'a> {
    pub harvester: &'a Harvester,
    /// Set when the client cancels this call or the server shuts down.
    pub cancel: &'a CancellationToken,
    pub progress: &'a dyn ProgressSink,
}

pub struct ToolRegistry;

impl ToolRegistry {
    pub fn list_tools() -> Vec<ToolDefinition> {
        vec![download_images::definition()]
    }

    pub async fn call(
        name: &str,
        arguments: Option<Value>,
        ctx: &ToolContext<'_>,
    ) -> McpResult<ToolCallResult> {
        let args = arguments.unwrap_or(Value::Object(serde_json::Map::new()));

        match name {
            download_images::NAME => download_images::execute(args, ctx).await,
            _ => Err(McpError::ToolNotFound(name.to_string())),
        }
    }
}
