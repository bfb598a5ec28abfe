use crate::ports::ToolExecutor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use switchyard_core::{SwitchyardError, SwitchyardResult, ToolCall, ToolDefinition, ToolResult};
use tracing::{debug, info, warn};

/// Per-call information handed to a [`Tool`].
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Id of the user whose message led to the call.
    pub sender_id: String,
}

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and parameter schema.
    fn definition(&self) -> &ToolDefinition;

    /// Runs the tool with already-parsed arguments.
    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext)
        -> SwitchyardResult<String>;
}

/// Registry of tools by name.
///
/// Execution never fails as a whole: unknown names, unparseable arguments and
/// tool errors all come back as an error [`ToolResult`] the backend can read.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registers a tool. Names are unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> SwitchyardResult<()> {
        let name = tool.definition().name.clone();
        if self.tools.contains_key(&name) {
            return Err(SwitchyardError::Tool(format!(
                "Tool already registered: {name}"
            )));
        }
        info!(tool = %name, "Tool registered");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Looks up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Whether a tool with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| t.definition().clone())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    async fn execute(&self, call: &ToolCall, sender_id: &str) -> SwitchyardResult<ToolResult> {
        let Some(tool) = self.get(&call.name) else {
            warn!(tool = %call.name, "Unknown tool requested");
            return Ok(ToolResult::error(
                call,
                format!("Error: Unknown tool \"{}\"", call.name),
            ));
        };

        let args = match call.parsed_arguments() {
            Ok(args) if args.is_object() => args,
            Ok(_) => {
                return Ok(ToolResult::error(
                    call,
                    "Validation error: arguments must be a JSON object",
                ))
            }
            Err(e) => return Ok(ToolResult::error(call, format!("Validation error: {e}"))),
        };

        let ctx = ToolContext {
            sender_id: sender_id.to_string(),
        };
        match tool.execute(args, &ctx).await {
            Ok(content) => {
                info!(tool = %call.name, call_id = %call.id, "Tool executed successfully");
                Ok(ToolResult::success(call, content))
            }
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool failed");
                Ok(ToolResult::error(call, format!("Error: {e}")))
            }
        }
    }
}

/// Reports the current UTC time.
pub struct CurrentTimeTool {
    definition: ToolDefinition,
}

impl CurrentTimeTool {
    /// Tool name as advertised to the backend.
    pub const NAME: &'static str = "get_current_time";

    /// Creates the tool.
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition {
                name: Self::NAME.to_string(),
                description: "Get the current date and time in UTC (RFC 3339).".to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {}
                }),
            },
        }
    }
}

impl Default for CurrentTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _args: serde_json::Value,
        ctx: &ToolContext,
    ) -> SwitchyardResult<String> {
        debug!(sender = %ctx.sender_id, "Reporting current time");
        Ok(chrono::Utc::now().to_rfc3339())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct FailingTool {
        definition: ToolDefinition,
    }

    #[async_trait]
    impl Tool for FailingTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(
            &self,
            _args: serde_json::Value,
            _ctx: &ToolContext,
        ) -> SwitchyardResult<String> {
            Err(SwitchyardError::Tool("disk full".into()))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(CurrentTimeTool::new())).unwrap();
        registry
            .register(Arc::new(FailingTool {
                definition: ToolDefinition {
                    name: "write_file".into(),
                    description: "always fails".into(),
                    parameters: serde_json::json!({"type": "object"}),
                },
            }))
            .unwrap();
        registry
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = registry();
        let err = registry
            .register(Arc::new(CurrentTimeTool::new()))
            .unwrap_err();
        assert!(err.to_string().contains("Tool already registered: get_current_time"));
        assert_eq!(registry.tool_count(), 2);
    }

    #[test]
    fn test_definitions_sorted() {
        let names: Vec<_> = registry()
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["get_current_time", "write_file"]);
    }

    #[tokio::test]
    async fn test_execute_success() {
        let call = ToolCall::new("c1", CurrentTimeTool::NAME, "");
        let result = registry().execute(&call, "u1").await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.tool_call_id, "c1");
        assert!(chrono::DateTime::parse_from_rfc3339(&result.content).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let call = ToolCall::new("c1", "launch_rockets", "{}");
        let result = registry().execute(&call, "u1").await.unwrap();
        assert!(result.is_error);
        assert_eq!(result.content, "Error: Unknown tool \"launch_rockets\"");
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let call = ToolCall::new("c1", CurrentTimeTool::NAME, "{not json");
        let result = registry().execute(&call, "u1").await.unwrap();
        assert!(result.is_error);
        assert!(result.content.starts_with("Validation error:"));

        let call = ToolCall::new("c2", CurrentTimeTool::NAME, "[1, 2]");
        let result = registry().execute(&call, "u1").await.unwrap();
        assert!(result.content.starts_with("Validation error:"));
    }

    #[tokio::test]
    async fn test_tool_failure_becomes_error_result() {
        let call = ToolCall::new("c1", "write_file", "{}");
        let result = registry().execute(&call, "u1").await.unwrap();
        assert!(result.is_error);
        assert_eq!(result.content, "Error: Tool error: disk full");
    }
}
