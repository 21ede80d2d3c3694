use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncBufRead, AsyncWrite, BufReader};
use wrench_core::{DispatchError, Dispatcher};

pub mod framing;

use framing::{Frame, read_frame, write_frame};

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const MCP_SERVER_NAME: &str = "flyin-wrench-mcp";

/// JSON-RPC handler shared by the stdio transport and the `/mcp` HTTP route.
#[derive(Clone)]
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
}

impl McpServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Serve until stdin closes.
    pub async fn serve_stdio(&self) -> Result<(), String> {
        let mut reader = BufReader::new(io::stdin());
        let mut stdout = io::stdout();
        tracing::info!(
            server = MCP_SERVER_NAME,
            tools = self.dispatcher.registry().len(),
            "MCP stdio transport ready"
        );
        self.serve(&mut reader, &mut stdout).await
    }

    pub async fn serve<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<(), String>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let incoming = read_frame(reader)
                .await
                .map_err(|e| format!("Failed to read MCP message: {e}"))?;
            let Some((frame, framing)) = incoming else {
                tracing::info!("stdin closed, stopping MCP stdio transport");
                break;
            };

            let (responses, is_batch) = match frame {
                Frame::Message(message) => {
                    let is_batch = message.is_array();
                    (self.handle_incoming_message(message).await, is_batch)
                }
                Frame::Malformed(err) => {
                    tracing::warn!(error = %err, "discarding malformed MCP message");
                    (vec![error_response(Value::Null, RpcError::parse_error())], false)
                }
            };

            let written = if is_batch && !responses.is_empty() {
                write_frame(writer, &Value::Array(responses), framing).await
            } else if let Some(response) = responses.into_iter().next() {
                write_frame(writer, &response, framing).await
            } else {
                Ok(())
            };
            written.map_err(|e| format!("Failed to write MCP response: {e}"))?;
        }
        Ok(())
    }

    /// Handle one JSON-RPC message or batch. Notifications yield no response.
    pub async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // A client response; this server never issues requests.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match obj.get("id").cloned() {
            Some(id) => Some(match self.handle_request(method, params).await {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            }),
            None => {
                tracing::debug!(method, "MCP notification received");
                None
            }
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        tracing::debug!(method, "MCP request received");
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.dispatcher.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Shop dashboard tools. storeId defaults to satx and date to today when omitted. Call tools/list for the tools enabled on this server; results are returned as the upstream JSON."
        })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params.as_object().cloned().unwrap_or_default();

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| RpcError::invalid_params("Missing tool name"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let result = self
            .dispatcher
            .execute(name, &args)
            .await
            .map_err(RpcError::from)?;

        Ok(json!({
            "content": [{
                "type": "text",
                "text": to_pretty_json(&result)
            }]
        }))
    }
}

/// A body with neither `jsonrpc` nor `method` is the bare `{tool, arguments}`
/// shape and is answered REST-style.
pub fn is_jsonrpc_message(incoming: &Value) -> bool {
    match incoming {
        Value::Object(obj) => obj.contains_key("jsonrpc") || obj.contains_key("method"),
        Value::Array(_) => true,
        _ => false,
    }
}

#[derive(Debug)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const SERVER_ERROR: i64 = -32000;

    pub fn parse_error() -> Self {
        Self {
            code: Self::PARSE_ERROR,
            message: "Parse error".to_string(),
            data: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: Self::INVALID_REQUEST,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: Self::METHOD_NOT_FOUND,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: Self::INVALID_PARAMS,
            message: message.into(),
            data: None,
        }
    }
}

impl From<DispatchError> for RpcError {
    fn from(err: DispatchError) -> Self {
        let mut data = json!({ "error": err.code() });
        if let Some(docs_hint) = err.docs_hint() {
            data["docs_hint"] = Value::String(docs_hint);
        }
        Self {
            code: Self::SERVER_ERROR,
            message: err.to_string(),
            data: Some(data),
        }
    }
}

pub fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn error_response(id: Value, error: RpcError) -> Value {
    let mut payload = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    });
    if let Some(data) = error.data {
        payload["error"]["data"] = data;
    }
    payload
}

fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use wrench_core::config::{GatewayConfig, ServiceEndpoint, Tz};
    use wrench_core::fetch::{Fetch, FetchError, UpstreamRequest, UpstreamResponse};

    use super::*;

    struct StubFetch {
        status: u16,
        body: &'static str,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetch for StubFetch {
        async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse, FetchError> {
            self.calls.lock().unwrap().push(request.url.to_string());
            Ok(UpstreamResponse {
                status: self.status,
                status_text: if self.status == 200 { "OK" } else { "Bad Gateway" }.to_string(),
                body: self.body.as_bytes().to_vec(),
            })
        }
    }

    fn server_with(status: u16, body: &'static str) -> (McpServer, Arc<StubFetch>) {
        let fetch = Arc::new(StubFetch {
            status,
            body,
            calls: Mutex::new(Vec::new()),
        });
        let config = Arc::new(GatewayConfig {
            dashboard: ServiceEndpoint::new("http://dash.local", None),
            context: None,
            email: None,
            timezone: Tz::UTC,
            default_store_id: "satx".to_string(),
        });
        let dispatcher = Arc::new(Dispatcher::new(config, fetch.clone()));
        (McpServer::new(dispatcher), fetch)
    }

    async fn single(server: &McpServer, request: Value) -> Value {
        let mut responses = server.handle_incoming_message(request).await;
        assert_eq!(responses.len(), 1);
        responses.remove(0)
    }

    #[tokio::test]
    async fn tools_call_wraps_result_as_pretty_text() {
        let (server, fetch) = server_with(200, r#"{"stations":[]}"#);
        let response = single(
            &server,
            json!({"jsonrpc": "2.0", "method": "tools/call", "params": {"name": "get_workstations"}, "id": 1}),
        )
        .await;
        assert_eq!(
            response,
            json!({
                "jsonrpc": "2.0",
                "result": {"content": [{"type": "text", "text": "{\n  \"stations\": []\n}"}]},
                "id": 1
            })
        );
        assert_eq!(
            *fetch.calls.lock().unwrap(),
            vec!["http://dash.local/api/workstations".to_string()]
        );
    }

    #[tokio::test]
    async fn initialize_reports_protocol_and_capabilities() {
        let (server, _) = server_with(200, "{}");
        let response = single(
            &server,
            json!({"jsonrpc": "2.0", "method": "initialize", "params": {}, "id": "init"}),
        )
        .await;
        assert_eq!(response["id"], "init");
        assert_eq!(response["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(response["result"]["serverInfo"]["name"], MCP_SERVER_NAME);
        assert!(response["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn tools_list_returns_registry() {
        let (server, _) = server_with(200, "{}");
        let response = single(
            &server,
            json!({"jsonrpc": "2.0", "method": "tools/list", "id": 2}),
        )
        .await;
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 15);
        assert_eq!(tools[0]["name"], "get_open_repair_orders");
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let (server, _) = server_with(200, "{}");
        let response = single(
            &server,
            json!({"jsonrpc": "2.0", "method": "resources/list", "id": 3}),
        )
        .await;
        assert_eq!(response["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn missing_tool_name_is_invalid_params() {
        let (server, fetch) = server_with(200, "{}");
        let response = single(
            &server,
            json!({"jsonrpc": "2.0", "method": "tools/call", "params": {"arguments": {}}, "id": 4}),
        )
        .await;
        assert_eq!(response["error"]["code"], -32602);
        assert_eq!(response["error"]["message"], "Missing tool name");
        assert!(fetch.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dispatch_failures_are_server_errors() {
        let (server, _) = server_with(502, "{}");
        let response = single(
            &server,
            json!({"jsonrpc": "2.0", "method": "tools/call", "params": {"name": "get_scorecard"}, "id": 5}),
        )
        .await;
        assert_eq!(response["error"]["code"], -32000);
        assert_eq!(
            response["error"]["message"],
            "Dashboard API error: 502 Bad Gateway"
        );
        assert_eq!(response["error"]["data"]["error"], "upstream_error");

        let response = single(
            &server,
            json!({"jsonrpc": "2.0", "method": "tools/call", "params": {"name": "get_frday"}, "id": 6}),
        )
        .await;
        assert_eq!(response["error"]["code"], -32000);
        assert_eq!(response["error"]["message"], "Unknown tool: get_frday");
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let (server, _) = server_with(200, "{}");
        let responses = server
            .handle_incoming_message(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn batches_answer_each_request() {
        let (server, _) = server_with(200, "{}");
        let responses = server
            .handle_incoming_message(json!([
                {"jsonrpc": "2.0", "method": "ping", "id": 1},
                {"jsonrpc": "2.0", "method": "notifications/initialized"},
                {"jsonrpc": "2.0", "method": "tools/list", "id": 2}
            ]))
            .await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["result"], json!({}));

        let responses = server.handle_incoming_message(json!([])).await;
        assert_eq!(responses[0]["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn wrong_version_is_invalid_request() {
        let (server, _) = server_with(200, "{}");
        let response = single(&server, json!({"jsonrpc": "1.0", "method": "ping", "id": 9})).await;
        assert_eq!(response["error"]["code"], -32600);
        assert_eq!(response["id"], 9);
    }

    #[test]
    fn bare_tool_shape_is_not_jsonrpc() {
        assert!(!is_jsonrpc_message(&json!({"tool": "get_workstations", "arguments": {}})));
        assert!(is_jsonrpc_message(&json!({"method": "tools/list"})));
        assert!(is_jsonrpc_message(&json!({"jsonrpc": "2.0"})));
        assert!(is_jsonrpc_message(&json!([])));
    }

    #[tokio::test]
    async fn serve_loop_answers_in_request_framing() {
        let (server, _) = server_with(200, "{}");
        let input = b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":1}\nnot json\n".to_vec();
        let mut reader = BufReader::new(input.as_slice());
        let mut output = Vec::new();
        server.serve(&mut reader, &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], json!({"jsonrpc": "2.0", "id": 1, "result": {}}));
        assert_eq!(lines[1]["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn serve_loop_survives_undecodable_frames() {
        let (server, _) = server_with(200, "{}");
        let mut input = b"\xff\xfe\n".to_vec();
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":2}\n");
        let mut reader = BufReader::new(input.as_slice());
        let mut output = Vec::new();
        server.serve(&mut reader, &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["error"]["code"], -32700);
        assert_eq!(lines[1], json!({"jsonrpc": "2.0", "id": 2, "result": {}}));
    }
}
