//! configure_gemini_token 工具：校验并持久化 API Key

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{ConfigStore, CONFIG_FILE};
use crate::core::ServerError;
use crate::tools::Tool;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ConfigureTokenArgs {
    /// Gemini API Key（非空字符串）
    api_key: String,
}

pub struct ConfigureTokenTool {
    config: Arc<ConfigStore>,
}

impl ConfigureTokenTool {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for ConfigureTokenTool {
    fn name(&self) -> &str {
        "configure_gemini_token"
    }

    fn description(&self) -> &str {
        "Save a Gemini API key to the local config record. \
         Args: {\"apiKey\": \"...\"}"
    }

    fn input_schema(&self) -> Value {
        serde_json::to_value(schema_for!(ConfigureTokenArgs)).unwrap_or_default()
    }

    async fn execute(&self, args: Value) -> Result<String, ServerError> {
        let args: ConfigureTokenArgs = serde_json::from_value(args)
            .map_err(|e| ServerError::InvalidRequest(format!("invalid arguments: {e}")))?;
        if args.api_key.trim().is_empty() {
            return Err(ServerError::InvalidRequest(
                "apiKey must be a non-empty string".to_string(),
            ));
        }
        self.config.save_api_key(args.api_key.trim())?;
        Ok(format!("Gemini API key saved to {CONFIG_FILE}"))
    }
}
