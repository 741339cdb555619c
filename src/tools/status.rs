//! get_configuration_status 工具：配置来源的人类可读描述

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::ConfigStore;
use crate::core::ServerError;
use crate::tools::Tool;

pub struct ConfigStatusTool {
    config: Arc<ConfigStore>,
}

impl ConfigStatusTool {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for ConfigStatusTool {
    fn name(&self) -> &str {
        "get_configuration_status"
    }

    fn description(&self) -> &str {
        "Describe where the Gemini API key and storage configuration come from"
    }

    async fn execute(&self, _args: Value) -> Result<String, ServerError> {
        Ok(self.config.resolve().describe())
    }
}
