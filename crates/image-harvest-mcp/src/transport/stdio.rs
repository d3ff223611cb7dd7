//! Stdio transport: JSON-RPC in on stdin, out on stdout.
//!
//! Each incoming message is handled on its own task so a cancellation can
//! reach a long-running `tools/call`. All outgoing frames, responses and
//! progress notifications alike, go through one writer task.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;

use crate::protocol::ProtocolHandler;
use crate::types::{McpError, McpResult, RequestId};

use super::framing;

/// Stdio transport for desktop MCP clients.
pub struct StdioTransport {
    handler: Arc<ProtocolHandler>,
}

impl StdioTransport {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Serve on the process's stdin and stdout.
    pub async fn run(&self) -> McpResult<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC from `input` until EOF.
    ///
    /// On EOF every running call is cancelled and awaited before returning,
    /// so no browser outlives the connection.
    pub async fn serve<R, W>(&self, input: R, output: W) -> McpResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<Value>();
        self.handler.connect(tx.clone()).await;
        let writer = tokio::spawn(write_frames(output, rx));

        let mut lines = BufReader::new(input).lines();
        let mut tasks = JoinSet::new();
        let mut read_error = None;

        tracing::info!("Stdio transport started");

        loop {
            tokio::select! {
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
                next = lines.next_line() => match next {
                    Ok(Some(line)) => self.dispatch_line(&line, &tx, &mut tasks),
                    Ok(None) => {
                        tracing::info!("EOF on stdin, shutting down");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed reading stdin: {e}");
                        read_error = Some(e);
                        break;
                    }
                },
            }
        }

        let running = self.handler.shutdown().await;
        if running > 0 {
            tracing::info!("Waiting for {running} running request(s) to stop");
        }
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }

        self.handler.disconnect().await;
        drop(tx);
        writer
            .await
            .map_err(|e| McpError::Transport(e.to_string()))??;

        match read_error {
            Some(e) => Err(McpError::Io(e)),
            None => Ok(()),
        }
    }

    fn dispatch_line(&self, line: &str, tx: &UnboundedSender<Value>, tasks: &mut JoinSet<()>) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        match framing::parse_message(trimmed) {
            Ok(msg) => {
                let handler = Arc::clone(&self.handler);
                let tx = tx.clone();
                tasks.spawn(async move {
                    if let Some(response) = handler.handle_message(msg).await {
                        if tx.send(response).is_err() {
                            tracing::warn!("Response dropped, writer has stopped");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!("Parse error: {e}");
                let error_response = e.to_json_rpc_error(RequestId::Null);
                match serde_json::to_value(error_response) {
                    Ok(value) => {
                        if tx.send(value).is_err() {
                            tracing::warn!("Error response dropped, writer has stopped");
                        }
                    }
                    Err(e) => tracing::error!("Could not encode parse error: {e}"),
                }
            }
        }
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("Request task failed: {e}");
    }
}

async fn write_frames<W>(mut output: W, mut rx: UnboundedReceiver<Value>) -> McpResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let framed = framing::frame_message(&frame)?;
        output
            .write_all(framed.as_bytes())
            .await
            .map_err(McpError::Io)?;
        output.flush().await.map_err(McpError::Io)?;
    }
    Ok(())
}
