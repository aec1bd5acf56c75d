//! MCP Server Implementation
//!
//! JSON-RPC 2.0 server over stdio for the Model Context Protocol. A server
//! session is bound to exactly one principal; every tool call runs with that
//! principal's grants.
//!
//! # Example
//!
//! ```ignore
//! let gateway = Gateway::new(db, GatewayConfig::default());
//! let mut server = McpServer::new(McpServerConfig::default(), gateway, principal);
//! server.run_stdio().await?;
//! ```

use crate::gateway::Gateway;
use crate::protocol::{
    error_code, methods, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, McpProtocol, RequestId, ServerCapabilities, ServerInfo, ToolsCallParams,
    ToolsCallResult, ToolsCapability, ToolsListResult, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use crate::tools::{ToolContext, ToolRegistry};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use sqlwarden_guard::{GatewayError, Principal};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::{debug, error, info, warn};

/// Default response budget (1 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Server name (reported in initialize)
    pub server_name: String,

    /// Server version (reported in initialize)
    pub server_version: String,

    /// Maximum serialized tool result size in bytes
    pub max_response_bytes: usize,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            server_name: "sqlwarden".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

pub struct McpServer {
    config: McpServerConfig,
    gateway: Gateway,
    principal: Principal,
    tools: ToolRegistry,
    initialized: bool,
}

impl McpServer {
    pub fn new(config: McpServerConfig, gateway: Gateway, principal: Principal) -> Self {
        Self {
            config,
            gateway,
            principal,
            tools: ToolRegistry::new(),
            initialized: false,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Serve on process stdin/stdout until stdin closes.
    pub async fn run_stdio(&mut self) -> Result<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve line-delimited JSON-RPC from `reader` until EOF.
    pub async fn serve<R, W>(&mut self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut protocol = McpProtocol::new(reader, writer);
        info!(user_id = self.principal.id, role = %self.principal.role, "MCP server starting");

        while let Some(line) = protocol
            .read_message()
            .await
            .context("Failed to read request")?
        {
            let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    warn!("Failed to parse request: {}", e);
                    Some(JsonRpcResponse::error(
                        RequestId::Null,
                        JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
                    ))
                }
            };

            if let Some(response) = response {
                protocol
                    .write_response(&response)
                    .await
                    .context("Failed to write response")?;
            }
        }

        info!("MCP server shutting down");
        Ok(())
    }

    /// Handle a single request. Notifications yield no response.
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or_default(),
                JsonRpcError::invalid_request(format!(
                    "Invalid JSON-RPC version: {}",
                    request.jsonrpc
                )),
            ));
        }

        let Some(id) = request.id.clone() else {
            if request.method != methods::INITIALIZED {
                debug!("Ignoring notification: {}", request.method);
            }
            return None;
        };

        let response = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(id, request.params),
            methods::INITIALIZED => JsonRpcResponse::success(id, json!({})),
            methods::TOOLS_LIST => self.handle_tools_list(id),
            methods::TOOLS_CALL => self.handle_tools_call(id, request.params).await,
            methods::PING => JsonRpcResponse::success(id, json!({})),
            other => JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
        };
        Some(response)
    }

    fn handle_initialize(&mut self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid initialize params: {}", e)),
                );
            }
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing initialize params"),
                );
            }
        };

        info!(
            "Initialize from {} v{} (protocol {})",
            params.client_info.name, params.client_info.version, params.protocol_version
        );
        self.initialized = true;

        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: self.config.server_name.clone(),
                version: self.config.server_version.clone(),
            },
        };
        respond(id, &result)
    }

    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.tools.list_tools(),
        };
        respond(id, &result)
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        if !self.initialized {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request("Server not initialized"),
            );
        }

        let params: ToolsCallParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid tool call params: {}", e)),
                );
            }
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing tool call params"),
                );
            }
        };

        if !self.tools.has_tool(&params.name) {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params(format!("Unknown tool: {}", params.name)),
            );
        }

        info!(tool = %params.name, user_id = self.principal.id, "Tool call");
        let ctx = ToolContext {
            gateway: &self.gateway,
            principal: &self.principal,
        };

        let result = match self.tools.call_tool(&params.name, params.arguments, &ctx).await {
            Ok(value) => self.budgeted(&value),
            Err(err) => tool_error(&params.name, &err),
        };
        respond(id, &result)
    }

    /// Serialize a tool result, replacing it with a truncation notice when it
    /// exceeds the response budget.
    fn budgeted(&self, value: &Value) -> ToolsCallResult {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize tool result: {}", e);
                return tool_error("", &GatewayError::internal("result serialization failed"));
            }
        };

        if json.len() <= self.config.max_response_bytes {
            return ToolsCallResult::text(json, false);
        }

        warn!(
            "Response truncated from {} to {} bytes",
            json.len(),
            self.config.max_response_bytes
        );
        let notice = json!({
            "truncated": true,
            "max_bytes": self.config.max_response_bytes,
            "original_bytes": json.len(),
            "message": "Response exceeded size limit. Use LIMIT or filters to reduce output.",
            "partial_data": null
        });
        ToolsCallResult::text(notice.to_string(), true)
    }
}

fn tool_error(tool: &str, err: &GatewayError) -> ToolsCallResult {
    if err.kind().is_client_error() {
        info!(tool, kind = %err.kind(), "Tool rejected: {}", err.message());
    } else {
        error!(tool, "Tool failed: {}", err);
    }
    let body = json!({
        "error": {
            "kind": err.kind(),
            "code": error_code(err.kind()),
            "message": err.message(),
        }
    });
    ToolsCallResult::text(body.to_string(), true)
}

fn respond<T: Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            JsonRpcResponse::error(id, JsonRpcError::internal_error("Failed to serialize response"))
        }
    }
}
