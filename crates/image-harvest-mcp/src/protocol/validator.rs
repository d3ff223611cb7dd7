//! JSON-RPC request validation.

use crate::types::{JsonRpcRequest, McpError, McpResult, RequestId, JSONRPC_VERSION};

/// Validate that a JSON-RPC request is well-formed.
pub fn validate_request(request: &JsonRpcRequest) -> McpResult<()> {
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(McpError::InvalidRequest(format!(
            "Expected jsonrpc version \"{JSONRPC_VERSION}\", got \"{}\"",
            request.jsonrpc
        )));
    }

    if request.method.is_empty() {
        return Err(McpError::InvalidRequest(
            "Method name must not be empty".to_string(),
        ));
    }

    // Cancellation is keyed by id, so a null id could never be cancelled.
    if request.id == RequestId::Null {
        return Err(McpError::InvalidRequest(
            "Request id must not be null".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(jsonrpc: &str, id: RequestId, method: &str) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: jsonrpc.to_string(),
            id,
            method: method.to_string(),
            params: None,
        }
    }

    #[test]
    fn test_rejects_wrong_version_and_empty_method() {
        assert!(validate_request(&request("1.0", RequestId::Number(1), "ping")).is_err());
        assert!(validate_request(&request("2.0", RequestId::Number(1), "")).is_err());
        assert!(validate_request(&request("2.0", RequestId::Number(1), "ping")).is_ok());
    }

    #[test]
    fn test_rejects_null_id() {
        let err = validate_request(&request("2.0", RequestId::Null, "tools/call")).unwrap_err();
        assert_eq!(err.code(), crate::types::error_codes::INVALID_REQUEST);
    }
}
