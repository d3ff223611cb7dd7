//! Request dispatcher: receives JSON-RPC messages and routes them to handlers.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use image_harvest::{Harvester, NoProgress, ProgressSink};

use crate::tools::{ToolContext, ToolRegistry};
use crate::types::*;

use super::negotiation::NegotiatedCapabilities;
use super::progress::ProgressReporter;
use super::validator::validate_request;

/// How many cancellations for not-yet-registered requests are remembered.
const EARLY_CANCEL_LIMIT: usize = 64;

/// The main protocol handler that dispatches incoming JSON-RPC messages.
///
/// Safe to share across tasks: a `tools/call` can be in progress while a
/// cancellation for it is handled on another task.
pub struct ProtocolHandler {
    harvester: Arc<Harvester>,
    capabilities: Arc<Mutex<NegotiatedCapabilities>>,
    in_flight: Mutex<HashMap<RequestId, CancellationToken>>,
    /// Cancellations that arrived before their `tools/call` registered.
    early_cancels: Mutex<VecDeque<RequestId>>,
    outbound: Mutex<Option<UnboundedSender<Value>>>,
    shutting_down: AtomicBool,
}

impl ProtocolHandler {
    pub fn new(harvester: Arc<Harvester>) -> Self {
        Self {
            harvester,
            capabilities: Arc::new(Mutex::new(NegotiatedCapabilities::default())),
            in_flight: Mutex::new(HashMap::new()),
            early_cancels: Mutex::new(VecDeque::new()),
            outbound: Mutex::new(None),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Route server-initiated notifications to `outbound`.
    pub async fn connect(&self, outbound: UnboundedSender<Value>) {
        *self.outbound.lock().await = Some(outbound);
    }

    /// Stop emitting notifications and release the sender.
    pub async fn disconnect(&self) {
        self.outbound.lock().await.take();
    }

    /// Stop every running tool call; calls that register later start out
    /// cancelled. Returns how many were running.
    pub async fn shutdown(&self) -> usize {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.cancel_all().await
    }

    /// Signal every running tool call to stop. Returns how many were running.
    pub async fn cancel_all(&self) -> usize {
        let in_flight = self.in_flight.lock().await;
        for token in in_flight.values() {
            token.cancel();
        }
        in_flight.len()
    }

    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    pub async fn handle_message(&self, msg: JsonRpcMessage) -> Option<Value> {
        match msg {
            JsonRpcMessage::Request(req) => Some(self.handle_request(req).await),
            JsonRpcMessage::Notification(notif) => {
                self.handle_notification(notif).await;
                None
            }
            _ => {
                tracing::warn!("Received unexpected message type from client");
                None
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Value {
        if let Err(e) = validate_request(&request) {
            return serde_json::to_value(e.to_json_rpc_error(request.id)).unwrap_or_default();
        }

        let id = request.id.clone();
        let result = self.dispatch_request(&request).await;

        match result {
            Ok(value) => serde_json::to_value(JsonRpcResponse::new(id, value)).unwrap_or_default(),
            Err(e) => serde_json::to_value(e.to_json_rpc_error(id)).unwrap_or_default(),
        }
    }

    async fn dispatch_request(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params.clone()).await,
            "shutdown" => self.handle_shutdown().await,

            "tools/list" => self.handle_tools_list().await,
            "tools/call" => {
                self.handle_tools_call(&request.id, request.params.clone())
                    .await
            }

            "ping" => Ok(Value::Object(serde_json::Map::new())),

            _ => Err(McpError::MethodNotFound(request.method.clone())),
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "initialized" | "notifications/initialized" => {
                self.capabilities.lock().await.mark_initialized();
            }
            "notifications/cancelled" | "$/cancelRequest" => {
                self.handle_cancel(notification.params).await;
            }
            _ => {
                tracing::debug!("Unknown notification: {}", notification.method);
            }
        }
    }

    async fn handle_cancel(&self, params: Option<Value>) {
        let params: CancelRequestParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                tracing::warn!("Malformed cancellation: {e}");
                return;
            }
            None => {
                tracing::warn!("Cancellation without params");
                return;
            }
        };
        let id: RequestId = match serde_json::from_value(params.request_id) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Malformed request id in cancellation: {e}");
                return;
            }
        };

        let in_flight = self.in_flight.lock().await;
        match in_flight.get(&id) {
            Some(token) => {
                tracing::info!(
                    "Cancelling request {id}{}",
                    params
                        .reason
                        .as_deref()
                        .map(|r| format!(": {r}"))
                        .unwrap_or_default()
                );
                token.cancel();
            }
            None => {
                tracing::debug!("Cancellation for unknown request {id}, holding it");
                let mut early = self.early_cancels.lock().await;
                if early.len() == EARLY_CANCEL_LIMIT {
                    early.pop_front();
                }
                early.push_back(id);
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let init_params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?
            .ok_or_else(|| McpError::InvalidParams("Initialize params required".to_string()))?;

        let mut caps = self.capabilities.lock().await;
        let result = caps.negotiate(init_params)?;

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_shutdown(&self) -> McpResult<Value> {
        tracing::info!("Shutdown requested");
        let cancelled = self.shutdown().await;
        if cancelled > 0 {
            tracing::info!("Stopping {cancelled} running harvest(s)");
        }
        Ok(Value::Object(serde_json::Map::new()))
    }

    async fn handle_tools_list(&self) -> McpResult<Value> {
        let result = ToolListResult {
            tools: ToolRegistry::list_tools(),
            next_cursor: None,
        };
        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_tools_call(&self, id: &RequestId, params: Option<Value>) -> McpResult<Value> {
        let call_params: ToolCallParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?
            .ok_or_else(|| McpError::InvalidParams("Tool call params required".to_string()))?;

        let reporter = match (
            call_params.progress_token(),
            self.outbound.lock().await.clone(),
        ) {
            (Some(token), Some(outbound)) => Some(ProgressReporter::new(token.clone(), outbound)),
            _ => None,
        };
        let progress: &dyn ProgressSink = match &reporter {
            Some(reporter) => reporter,
            None => &NoProgress,
        };

        let cancel = self.register(id).await?;
        let ctx = ToolContext {
            harvester: &self.harvester,
            cancel: &cancel,
            progress,
        };
        let result = ToolRegistry::call(&call_params.name, call_params.arguments, &ctx).await;
        self.in_flight.lock().await.remove(id);

        serde_json::to_value(result?).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn register(&self, id: &RequestId) -> McpResult<CancellationToken> {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.contains_key(id) {
            return Err(McpError::InvalidRequest(format!(
                "Request id {id} is already in flight"
            )));
        }
        let token = CancellationToken::new();
        if self.shutting_down.load(Ordering::SeqCst) {
            tracing::info!("Request {id} arrived during shutdown, running it cancelled");
            token.cancel();
        } else if self.take_early_cancel(id).await {
            tracing::info!("Request {id} was cancelled before it started");
            token.cancel();
        }
        in_flight.insert(id.clone(), token.clone());
        Ok(token)
    }

    async fn take_early_cancel(&self, id: &RequestId) -> bool {
        let mut early = self.early_cancels.lock().await;
        match early.iter().position(|held| held == id) {
            Some(pos) => {
                early.remove(pos);
                true
            }
            None => false,
        }
    }
}
