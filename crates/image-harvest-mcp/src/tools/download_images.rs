//! Tool: download_images. Search, download and keep large images.

use serde::Deserialize;
use serde_json::{json, Value};

use image_harvest::{HarvestRequest, ImageKind, KIB};

use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

use super::registry::ToolContext;

pub const NAME: &str = "download_images";

const DEFAULT_NUM_IMAGES: i64 = 5;
const DEFAULT_MIN_SIZE_KIB: i64 = 180;
const DEFAULT_IMAGE_TYPE: &str = "photo";

#[derive(Debug, Deserialize)]
struct DownloadParams {
    query: String,
    #[serde(default = "default_num_images")]
    num_images: i64,
    #[serde(default = "default_min_size")]
    min_size: i64,
    #[serde(default = "default_image_type")]
    image_type: String,
}

fn default_num_images() -> i64 {
    DEFAULT_NUM_IMAGES
}

fn default_min_size() -> i64 {
    DEFAULT_MIN_SIZE_KIB
}

fn default_image_type() -> String {
    DEFAULT_IMAGE_TYPE.to_string()
}

pub fn definition() -> ToolDefinition {
    let kinds: Vec<&str> = ImageKind::ALL.iter().map(|k| k.as_str()).collect();
    ToolDefinition {
        name: NAME.to_string(),
        description: Some(
            "Search the web for images, download the full-size versions and keep \
             those at least min_size KiB. Returns the absolute paths of saved files."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search text" },
                "num_images": {
                    "type": "integer",
                    "minimum": 1,
                    "default": DEFAULT_NUM_IMAGES,
                    "description": "How many images to keep"
                },
                "min_size": {
                    "type": "integer",
                    "minimum": 0,
                    "default": DEFAULT_MIN_SIZE_KIB,
                    "description": "Smallest file size to keep, in KiB"
                },
                "image_type": {
                    "type": "string",
                    "enum": kinds,
                    "default": DEFAULT_IMAGE_TYPE,
                    "description": "Search type filter"
                }
            },
            "required": ["query"]
        }),
    }
}

/// Validate raw arguments into a request.
fn parse_request(args: Value) -> McpResult<HarvestRequest> {
    let params: DownloadParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let target = usize::try_from(params.num_images)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| {
            McpError::InvalidParams(format!(
                "num_images must be at least 1, got {}",
                params.num_images
            ))
        })?;
    let min_size_bytes = u64::try_from(params.min_size)
        .ok()
        .and_then(|kib| kib.checked_mul(KIB))
        .ok_or_else(|| {
            McpError::InvalidParams(format!(
                "min_size must be a non-negative number of KiB, got {}",
                params.min_size
            ))
        })?;
    let kind: ImageKind = params.image_type.parse()?;

    Ok(HarvestRequest::new(params.query, target, min_size_bytes, kind)?)
}

pub async fn execute(args: Value, ctx: &ToolContext<'_>) -> McpResult<ToolCallResult> {
    let request = parse_request(args)?;

    let result = ctx.harvester.run(&request, ctx.cancel, ctx.progress).await;

    if result.is_success() {
        Ok(ToolCallResult::json(&result))
    } else {
        Ok(ToolCallResult::json_error(&result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply() {
        let request = parse_request(json!({ "query": "red fox" })).unwrap();
        assert_eq!(request.query, "red fox");
        assert_eq!(request.target_count, 5);
        assert_eq!(request.min_size_bytes, 180 * 1024);
        assert_eq!(request.image_kind, ImageKind::Photo);
    }

    #[test]
    fn test_image_type_is_case_insensitive() {
        let request = parse_request(json!({ "query": "x", "image_type": "ClipArt" })).unwrap();
        assert_eq!(request.image_kind, ImageKind::Clipart);
    }

    #[test]
    fn test_zero_min_size_is_allowed() {
        let request = parse_request(json!({ "query": "x", "min_size": 0 })).unwrap();
        assert_eq!(request.min_size_bytes, 0);
    }

    #[test]
    fn test_invalid_arguments() {
        for args in [
            json!({}),
            json!({ "query": "" }),
            json!({ "query": "   " }),
            json!({ "query": "x", "num_images": 0 }),
            json!({ "query": "x", "num_images": -3 }),
            json!({ "query": "x", "num_images": "five" }),
            json!({ "query": "x", "min_size": -1 }),
            json!({ "query": "x", "image_type": "panorama" }),
        ] {
            let err = parse_request(args.clone()).unwrap_err();
            assert_eq!(
                err.code(),
                crate::types::error_codes::INVALID_PARAMS,
                "args {args} gave {err}"
            );
        }
    }

    #[test]
    fn test_schema_lists_every_image_type() {
        let def = definition();
        let kinds = def.input_schema["properties"]["image_type"]["enum"]
            .as_array()
            .unwrap()
            .len();
        assert_eq!(kinds, 6);
        assert_eq!(def.input_schema["required"], json!(["query"]));
    }
}
