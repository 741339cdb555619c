//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / input_schema / execute），
//! 由 ToolRegistry 按名注册与查找；execute 统一记一条 JSON 审计日志。
//! 错误返回 ServerError，由 RPC 层映射错误码。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::ServerError;

/// 工具 trait：名称、描述（供客户端展示）、参数 JSON Schema、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（tools/call 的 "name" 字段）
    fn name(&self) -> &str;

    /// 工具描述
    fn description(&self) -> &str;

    /// 参数 JSON Schema（tools/list 的 inputSchema）
    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具；成功返回结果文本（通常是 JSON 字符串）
    async fn execute(&self, args: Value) -> Result<String, ServerError>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，保留注册顺序供 tools/list 输出
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// 执行指定工具；每次调用输出结构化审计日志（JSON）
    pub async fn execute(&self, name: &str, args: Value) -> Result<String, ServerError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ServerError::InvalidRequest(format!("Unknown tool: {name}")))?;

        let start = Instant::now();
        let result = tool.execute(args).await;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": name,
            "ok": result.is_ok(),
            "duration_ms": start.elapsed().as_millis() as u64,
        });
        tracing::info!(audit = %audit.to_string(), "tool");
        result
    }

    /// tools/list 的条目（按注册顺序）
    pub fn list_json(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "inputSchema": tool.input_schema(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperTool;

    #[async_trait]
    impl Tool for UpperTool {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercase text"
        }

        async fn execute(&self, args: Value) -> Result<String, ServerError> {
            let text = args
                .get("text")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ServerError::InvalidRequest("text is required".to_string()))?;
            Ok(text.to_uppercase())
        }
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(UpperTool);
        let out = registry
            .execute("upper", serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(out, "HI");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_request() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("nope", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.is_invalid_request());
    }

    #[tokio::test]
    async fn test_list_json_preserves_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(UpperTool);
        let entries = registry.list_json();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["name"], "upper");
        assert!(entries[0]["inputSchema"].is_object());
    }
}
