use std::collections::HashMap;

use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{Map, Value, json};

use crate::config::{GatewayConfig, Service};
use crate::error::DispatchError;

pub const DEFAULT_LOG_SOURCE: &str = "claude-web";
pub const DEFAULT_ACTION_PRIORITY: &str = "normal";

/// Upstream call derived from a tool's arguments, before the base URL and
/// credentials of its service are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamCall {
    pub service: Service,
    pub method: Method,
    pub path: &'static str,
    /// Trailing path segment, percent-encoded when the URL is built.
    pub segment: Option<String>,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl UpstreamCall {
    fn get(service: Service, path: &'static str) -> Self {
        Self {
            service,
            method: Method::GET,
            path,
            segment: None,
            query: Vec::new(),
            body: None,
        }
    }

    fn with_segment(mut self, segment: String) -> Self {
        self.segment = Some(segment);
        self
    }

    fn with_query(mut self, key: &'static str, value: String) -> Self {
        self.query.push((key, value));
        self
    }

    fn with_body(mut self, method: Method, body: Value) -> Self {
        self.method = method;
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Call(UpstreamCall),
    /// Timed liveness probe of the dashboard login page.
    Probe,
}

/// Argument bag for one invocation, plus the defaults resolved for it.
pub struct ToolArgs<'a> {
    tool: &'static str,
    values: &'a Map<String, Value>,
    today: NaiveDate,
    default_store_id: &'a str,
}

impl<'a> ToolArgs<'a> {
    pub fn new(
        tool: &'static str,
        values: &'a Map<String, Value>,
        today: NaiveDate,
        default_store_id: &'a str,
    ) -> Self {
        Self {
            tool,
            values,
            today,
            default_store_id,
        }
    }

    /// Present, non-null, non-empty argument rendered as a string.
    pub fn optional(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::Null => None,
            Value::String(v) if v.trim().is_empty() => None,
            Value::String(v) => Some(v.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn required(&self, key: &'static str) -> Result<String, DispatchError> {
        self.optional(key).ok_or(DispatchError::MissingArgument {
            tool: self.tool,
            field: key,
        })
    }

    /// Required argument interpolated as one path segment. Dot segments are
    /// rejected since URL normalisation would drop them.
    pub fn path_segment(&self, key: &'static str) -> Result<String, DispatchError> {
        let value = self.required(key)?;
        if value == "." || value == ".." {
            return Err(DispatchError::InvalidArgument {
                tool: self.tool,
                field: key,
                reason: "dot segments are not allowed",
            });
        }
        Ok(value)
    }

    /// Raw JSON argument, for tools that forward structured payloads.
    pub fn required_value(&self, key: &'static str) -> Result<Value, DispatchError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Err(DispatchError::MissingArgument {
                tool: self.tool,
                field: key,
            }),
            Some(Value::String(v)) if v.trim().is_empty() => Err(DispatchError::MissingArgument {
                tool: self.tool,
                field: key,
            }),
            Some(value) => Ok(value.clone()),
        }
    }

    pub fn store_id(&self) -> String {
        self.optional("storeId")
            .unwrap_or_else(|| self.default_store_id.to_string())
    }

    /// `date` argument, or today as `YYYY-MM-DD`.
    pub fn date(&self) -> String {
        self.optional("date")
            .unwrap_or_else(|| self.today.format("%Y-%m-%d").to_string())
    }
}

type Planner = fn(&ToolArgs<'_>) -> Result<Plan, DispatchError>;

pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub service: Service,
    planner: Planner,
}

impl ToolDefinition {
    pub fn plan(&self, args: &ToolArgs<'_>) -> Result<Plan, DispatchError> {
        (self.planner)(args)
    }

    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

/// Ordered, immutable lookup table from tool name to definition.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    /// Registry for the services enabled in `config`. The dashboard group is
    /// always present.
    pub fn for_config(config: &GatewayConfig) -> Self {
        Self::with_services(&[
            Service::Dashboard,
            Service::Context,
            Service::Email,
        ]
        .into_iter()
        .filter(|service| config.is_enabled(*service))
        .collect::<Vec<_>>())
    }

    pub fn with_services(services: &[Service]) -> Self {
        let tools: Vec<ToolDefinition> = tool_definitions()
            .into_iter()
            .filter(|tool| services.contains(&tool.service))
            .collect();
        let index = tools
            .iter()
            .enumerate()
            .map(|(position, tool)| (tool.name, position))
            .collect();
        Self { tools, index }
    }

    pub fn list(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|position| &self.tools[*position])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Closest registered name, if any is reasonably similar.
    pub fn suggest(&self, name: &str) -> Option<&'static str> {
        self.tools
            .iter()
            .map(|tool| (tool.name, strsim::jaro_winkler(name, tool.name)))
            .filter(|(_, score)| *score >= 0.85)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(candidate, _)| candidate)
    }

    pub fn to_value(&self) -> Value {
        json!({ "tools": self.tools.iter().map(ToolDefinition::to_value).collect::<Vec<_>>() })
    }
}

fn store_only_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "storeId": { "type": "string", "description": "Store ID (default: satx)" }
        }
    })
}

fn store_and_date_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "storeId": { "type": "string", "description": "Store ID (default: satx)" },
            "date": { "type": "string", "description": "Date in YYYY-MM-DD format (default: today)" }
        }
    })
}

fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn dashboard_store_query(path: &'static str, args: &ToolArgs<'_>) -> Plan {
    Plan::Call(UpstreamCall::get(Service::Dashboard, path).with_query("storeId", args.store_id()))
}

fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get_open_repair_orders",
            description: "Get all open repair orders from the tech board",
            input_schema: store_only_schema(),
            service: Service::Dashboard,
            planner: |args| Ok(dashboard_store_query("/api/board/repair-orders", args)),
        },
        ToolDefinition {
            name: "get_repair_order",
            description: "Get details for a specific repair order by RO number",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "roNumber": { "type": "string", "description": "Repair order number" }
                },
                "required": ["roNumber"]
            }),
            service: Service::Dashboard,
            planner: |args| {
                let ro_number = args.path_segment("roNumber")?;
                Ok(Plan::Call(
                    UpstreamCall::get(Service::Dashboard, "/api/board/repair-order")
                        .with_segment(ro_number),
                ))
            },
        },
        ToolDefinition {
            name: "get_technicians",
            description: "Get list of all technicians with their current workload",
            input_schema: store_only_schema(),
            service: Service::Dashboard,
            planner: |args| Ok(dashboard_store_query("/api/board/technicians", args)),
        },
        ToolDefinition {
            name: "get_advisors",
            description: "Get list of all service advisors",
            input_schema: store_only_schema(),
            service: Service::Dashboard,
            planner: |args| Ok(dashboard_store_query("/api/board/advisors", args)),
        },
        ToolDefinition {
            name: "get_daily_gp",
            description: "Get daily gross profit metrics for a store",
            input_schema: store_and_date_schema(),
            service: Service::Dashboard,
            planner: |args| {
                Ok(Plan::Call(
                    UpstreamCall::get(Service::Dashboard, "/api/reports/daily-gp")
                        .with_query("storeId", args.store_id())
                        .with_query("date", args.date()),
                ))
            },
        },
        ToolDefinition {
            name: "get_scorecard",
            description: "Get the store scorecard with KPIs and goals",
            input_schema: store_only_schema(),
            service: Service::Dashboard,
            planner: |args| Ok(dashboard_store_query("/api/reports/scorecard", args)),
        },
        ToolDefinition {
            name: "get_cache_stats",
            description: "Get Tekmetric API cache statistics",
            input_schema: empty_schema(),
            service: Service::Dashboard,
            planner: |_| {
                Ok(Plan::Call(UpstreamCall::get(
                    Service::Dashboard,
                    "/api/board/cache-stats",
                )))
            },
        },
        ToolDefinition {
            name: "search_customer",
            description: "Search for a customer by phone number or name",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Phone number or customer name" },
                    "storeId": { "type": "string", "description": "Store ID (default: satx)" }
                },
                "required": ["query"]
            }),
            service: Service::Dashboard,
            planner: |args| {
                let query = args.required("query")?;
                Ok(Plan::Call(
                    UpstreamCall::get(Service::Dashboard, "/api/checkin/search")
                        .with_query("query", query)
                        .with_query("storeId", args.store_id()),
                ))
            },
        },
        ToolDefinition {
            name: "get_checkin_queue",
            description: "Get the current customer check-in queue",
            input_schema: store_only_schema(),
            service: Service::Dashboard,
            planner: |args| Ok(dashboard_store_query("/api/checkin/queue", args)),
        },
        ToolDefinition {
            name: "get_appointments",
            description: "Get today's appointments",
            input_schema: store_and_date_schema(),
            service: Service::Dashboard,
            planner: |args| {
                Ok(Plan::Call(
                    UpstreamCall::get(Service::Dashboard, "/api/board/appointments")
                        .with_query("storeId", args.store_id())
                        .with_query("date", args.date()),
                ))
            },
        },
        ToolDefinition {
            name: "get_workstations",
            description: "Get status of all workstations",
            input_schema: empty_schema(),
            service: Service::Dashboard,
            planner: |_| {
                Ok(Plan::Call(UpstreamCall::get(
                    Service::Dashboard,
                    "/api/workstations",
                )))
            },
        },
        ToolDefinition {
            name: "get_workstation_detail",
            description: "Get detailed info for a specific workstation",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workstationId": { "type": "string", "description": "Workstation ID" }
                },
                "required": ["workstationId"]
            }),
            service: Service::Dashboard,
            planner: |args| {
                let workstation_id = args.path_segment("workstationId")?;
                Ok(Plan::Call(
                    UpstreamCall::get(Service::Dashboard, "/api/workstations")
                        .with_segment(workstation_id),
                ))
            },
        },
        ToolDefinition {
            name: "get_employees",
            description: "Get list of employees for a store",
            input_schema: store_only_schema(),
            service: Service::Dashboard,
            planner: |args| Ok(dashboard_store_query("/api/employees", args)),
        },
        ToolDefinition {
            name: "get_training_status",
            description: "Get training completion status for employees",
            input_schema: store_only_schema(),
            service: Service::Dashboard,
            planner: |args| Ok(dashboard_store_query("/api/training/status", args)),
        },
        ToolDefinition {
            name: "get_server_status",
            description: "Get dashboard server health and uptime status",
            input_schema: empty_schema(),
            service: Service::Dashboard,
            planner: |_| Ok(Plan::Probe),
        },
        ToolDefinition {
            name: "get_friday",
            description: "Get the full Friday.md context including priorities, recent work, and action items",
            input_schema: empty_schema(),
            service: Service::Context,
            planner: |_| Ok(Plan::Call(UpstreamCall::get(Service::Context, "/api/friday"))),
        },
        ToolDefinition {
            name: "get_friday_section",
            description: "Get a specific section from Friday context (e.g., currentPriorities, recentWork, workflow)",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "section": { "type": "string", "description": "Section name" }
                },
                "required": ["section"]
            }),
            service: Service::Context,
            planner: |args| {
                let section = args.path_segment("section")?;
                Ok(Plan::Call(
                    UpstreamCall::get(Service::Context, "/api/friday/section").with_segment(section),
                ))
            },
        },
        ToolDefinition {
            name: "add_friday_log",
            description: "Add an entry to the Friday session log",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entry": { "type": "string", "description": "Log entry text" },
                    "source": { "type": "string", "description": "Who is writing the entry (default: claude-web)" }
                },
                "required": ["entry"]
            }),
            service: Service::Context,
            planner: |args| {
                let entry = args.required("entry")?;
                let source = args
                    .optional("source")
                    .unwrap_or_else(|| DEFAULT_LOG_SOURCE.to_string());
                Ok(Plan::Call(
                    UpstreamCall::get(Service::Context, "/api/friday/log")
                        .with_body(Method::POST, json!({ "entry": entry, "source": source })),
                ))
            },
        },
        ToolDefinition {
            name: "add_friday_action_item",
            description: "Add an action item to the Friday context",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "item": { "type": "string", "description": "Action item text" },
                    "priority": {
                        "type": "string",
                        "enum": ["low", "normal", "high"],
                        "description": "Priority (default: normal)"
                    },
                    "source": { "type": "string", "description": "Who is adding the item (default: claude-web)" }
                },
                "required": ["item"]
            }),
            service: Service::Context,
            planner: |args| {
                let item = args.required("item")?;
                let priority = args
                    .optional("priority")
                    .unwrap_or_else(|| DEFAULT_ACTION_PRIORITY.to_string());
                let source = args
                    .optional("source")
                    .unwrap_or_else(|| DEFAULT_LOG_SOURCE.to_string());
                Ok(Plan::Call(
                    UpstreamCall::get(Service::Context, "/api/friday/action-item").with_body(
                        Method::POST,
                        json!({ "item": item, "priority": priority, "source": source }),
                    ),
                ))
            },
        },
        ToolDefinition {
            name: "update_friday_section",
            description: "Update a specific section in the Friday context",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "section": { "type": "string", "description": "Section name" },
                    "data": { "description": "New section content, forwarded as-is" }
                },
                "required": ["section", "data"]
            }),
            service: Service::Context,
            planner: |args| {
                let section = args.path_segment("section")?;
                let data = args.required_value("data")?;
                Ok(Plan::Call(
                    UpstreamCall::get(Service::Context, "/api/friday/section")
                        .with_segment(section)
                        .with_body(Method::PATCH, data),
                ))
            },
        },
        ToolDefinition {
            name: "send_email",
            description: "Send an email through the shop's email service",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "to": { "type": "string", "description": "Recipient address" },
                    "subject": { "type": "string", "description": "Subject line" },
                    "html": { "type": "string", "description": "HTML body" },
                    "text": { "type": "string", "description": "Plain-text body" }
                },
                "required": ["to", "subject"]
            }),
            service: Service::Email,
            planner: |args| {
                let mut body = Map::new();
                body.insert("to".to_string(), Value::String(args.required("to")?));
                body.insert("subject".to_string(), Value::String(args.required("subject")?));
                for key in ["html", "text"] {
                    if let Some(value) = args.optional(key) {
                        body.insert(key.to_string(), Value::String(value));
                    }
                }
                Ok(Plan::Call(
                    UpstreamCall::get(Service::Email, "/api/email/send")
                        .with_body(Method::POST, Value::Object(body)),
                ))
            },
        },
    ]
}
