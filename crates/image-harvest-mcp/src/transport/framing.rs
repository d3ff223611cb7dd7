//! Message framing for newline-delimited JSON.

use crate::types::{JsonRpcMessage, McpError, McpResult};

/// Parse a single line of text as a JSON-RPC message.
pub fn parse_message(line: &str) -> McpResult<JsonRpcMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(McpError::ParseError("Empty message".to_string()));
    }
    if trimmed.starts_with('[') {
        return Err(McpError::InvalidRequest(
            "Batch messages are not supported".to_string(),
        ));
    }

    serde_json::from_str(trimmed).map_err(|e| McpError::ParseError(e.to_string()))
}

/// Serialize a value to a JSON line (with trailing newline).
pub fn frame_message(value: &serde_json::Value) -> McpResult<String> {
    let mut json = serde_json::to_string(value).map_err(McpError::Json)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::error_codes;

    #[test]
    fn test_parses_request_line() {
        let msg = parse_message(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
        assert!(matches!(msg, JsonRpcMessage::Request(_)));
    }

    #[test]
    fn test_malformed_lines() {
        assert_eq!(parse_message("   ").unwrap_err().code(), error_codes::PARSE_ERROR);
        assert_eq!(parse_message("{not json").unwrap_err().code(), error_codes::PARSE_ERROR);
        assert_eq!(
            parse_message(r#"[{"jsonrpc":"2.0","id":1,"method":"ping"}]"#)
                .unwrap_err()
                .code(),
            error_codes::INVALID_REQUEST
        );
    }

    #[test]
    fn test_frame_is_one_line() {
        let framed = frame_message(&serde_json::json!({ "a": "b\nc" })).unwrap();
        assert!(framed.ends_with('\n'));
        assert_eq!(framed.matches('\n').count(), 1);
    }
}
