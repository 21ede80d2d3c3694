use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use url::Url;

use crate::config::{GatewayConfig, Service, ServiceEndpoint};
use crate::error::DispatchError;
use crate::fetch::{API_KEY_HEADER, Fetch, UpstreamRequest};
use crate::tools::{Plan, ToolArgs, ToolRegistry, UpstreamCall};

const LIVENESS_PATH: &str = "/login";

/// Executes tools by name. Shared by every transport surface; holds no
/// mutable state, so one instance serves all concurrent requests.
pub struct Dispatcher {
    config: Arc<GatewayConfig>,
    registry: ToolRegistry,
    fetch: Arc<dyn Fetch>,
}

impl Dispatcher {
    pub fn new(config: Arc<GatewayConfig>, fetch: Arc<dyn Fetch>) -> Self {
        let registry = ToolRegistry::for_config(&config);
        Self {
            config,
            registry,
            fetch,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// `{ "tools": [...] }` listing, identical on every surface.
    pub fn tools_list_payload(&self) -> Value {
        self.registry.to_value()
    }

    pub async fn execute(&self, name: &str, args: &Map<String, Value>) -> Result<Value, DispatchError> {
        let tool = self.registry.get(name).ok_or_else(|| {
            tracing::warn!(tool = name, "unknown tool requested");
            DispatchError::UnknownTool {
                name: name.to_string(),
                suggestion: self.registry.suggest(name),
            }
        })?;

        let tool_args = ToolArgs::new(
            tool.name,
            args,
            self.today(),
            &self.config.default_store_id,
        );
        match tool.plan(&tool_args)? {
            Plan::Call(call) => self.call_upstream(tool.name, call).await,
            Plan::Probe => Ok(self.probe_dashboard().await),
        }
    }

    /// Today in the configured store timezone.
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.config.timezone).date_naive()
    }

    async fn call_upstream(&self, tool: &'static str, call: UpstreamCall) -> Result<Value, DispatchError> {
        let service = call.service;
        let endpoint = self
            .config
            .endpoint(service)
            .ok_or_else(|| DispatchError::UnknownTool {
                name: tool.to_string(),
                suggestion: None,
            })?;
        let request = build_request(endpoint, call)?;
        let method = request.method.clone();

        let started = Instant::now();
        let response = self.fetch.fetch(request).await.map_err(|err| {
            tracing::warn!(
                tool,
                service = service.as_str(),
                method = %method,
                error = %err,
                "upstream request failed"
            );
            DispatchError::Transport {
                service,
                message: err.message,
            }
        })?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !response.is_success() {
            tracing::warn!(
                tool,
                service = service.as_str(),
                method = %method,
                status = response.status,
                elapsed_ms,
                "upstream returned an error status"
            );
            return Err(DispatchError::Upstream {
                service,
                status: response.status,
                status_text: response.status_text,
            });
        }

        tracing::info!(
            tool,
            service = service.as_str(),
            method = %method,
            status = response.status,
            elapsed_ms,
            "upstream call completed"
        );
        parse_body(service, &response.body)
    }

    /// Times a request to the dashboard login page. Any HTTP response counts
    /// as online; only a fetch failure reports offline.
    async fn probe_dashboard(&self) -> Value {
        let base = &self.config.dashboard.base_url;
        let timestamp = || Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let url = match Url::parse(&format!("{base}{LIVENESS_PATH}")) {
            Ok(url) => url,
            Err(err) => {
                return json!({
                    "status": "offline",
                    "url": base,
                    "error": err.to_string(),
                    "timestamp": timestamp(),
                });
            }
        };

        let started = Instant::now();
        match self.fetch.fetch(UpstreamRequest::get(url)).await {
            Ok(_) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                tracing::debug!(latency_ms, "dashboard liveness probe succeeded");
                json!({
                    "status": "online",
                    "url": base,
                    "latency_ms": latency_ms,
                    "timestamp": timestamp(),
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "dashboard liveness probe failed");
                json!({
                    "status": "offline",
                    "url": base,
                    "error": err.message,
                    "timestamp": timestamp(),
                })
            }
        }
    }
}

fn build_request(endpoint: &ServiceEndpoint, call: UpstreamCall) -> Result<UpstreamRequest, DispatchError> {
    let service = call.service;
    let mut url = Url::parse(&format!("{}{}", endpoint.base_url, call.path)).map_err(|e| {
        DispatchError::Transport {
            service,
            message: format!("Invalid upstream URL: {e}"),
        }
    })?;
    if let Some(segment) = &call.segment {
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(segment);
        }
    }
    if !call.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &call.query {
            pairs.append_pair(key, value);
        }
    }

    let mut headers = vec![("content-type", "application/json".to_string())];
    if let Some(api_key) = &endpoint.api_key {
        headers.push((API_KEY_HEADER, api_key.clone()));
    }

    Ok(UpstreamRequest {
        method: call.method,
        url,
        headers,
        body: call.body,
    })
}

fn parse_body(service: Service, bytes: &[u8]) -> Result<Value, DispatchError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| DispatchError::Transport {
        service,
        message: format!("Invalid JSON in response body: {e}"),
    })
}
