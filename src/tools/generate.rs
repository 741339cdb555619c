//! generate_image 工具：文生图
//!
//! 调用序：压力检查 → 配置解析 → 模型调用 → 逐 part 持久化 → 激进回收。
//! 回收在成功与失败路径上都执行，失败的大负载尝试不留驻留结构。

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::ConfigStore;
use crate::core::ServerError;
use crate::gemini::ImageModel;
use crate::gemini::Part;
use crate::memory::MemoryPressureController;
use crate::pipeline;
use crate::storage::StorageRouter;
use crate::tools::Tool;

#[derive(Debug, Deserialize, JsonSchema)]
struct GenerateImageArgs {
    /// 生成提示词
    prompt: String,
}

pub struct GenerateImageTool {
    config: Arc<ConfigStore>,
    model: Arc<dyn ImageModel>,
    storage: Arc<StorageRouter>,
    memory: Arc<MemoryPressureController>,
}

impl GenerateImageTool {
    pub fn new(
        config: Arc<ConfigStore>,
        model: Arc<dyn ImageModel>,
        storage: Arc<StorageRouter>,
        memory: Arc<MemoryPressureController>,
    ) -> Self {
        Self {
            config,
            model,
            storage,
            memory,
        }
    }

    async fn run(&self, args: Value) -> Result<String, ServerError> {
        let args: GenerateImageArgs = serde_json::from_value(args)
            .map_err(|e| ServerError::InvalidRequest(format!("invalid arguments: {e}")))?;

        let config = self.config.resolve();
        let api_key = config.gemini_api_key.ok_or(ServerError::MissingApiKey)?;

        let response = self
            .model
            .generate(&api_key, vec![Part::text(&args.prompt)])
            .await?;
        let artifacts = pipeline::persist_inline_images(response, &self.storage).await?;

        let remote_url = artifacts
            .iter()
            .find_map(|a| a.remote_url())
            .map(str::to_string);
        Ok(serde_json::json!({ "remoteUrl": remote_url }).to_string())
    }
}

#[async_trait]
impl Tool for GenerateImageTool {
    fn name(&self) -> &str {
        "generate_image"
    }

    fn description(&self) -> &str {
        "Generate an image from a text prompt with Gemini. \
         Args: {\"prompt\": \"...\"}"
    }

    fn input_schema(&self) -> Value {
        serde_json::to_value(schema_for!(GenerateImageArgs)).unwrap_or_default()
    }

    async fn execute(&self, args: Value) -> Result<String, ServerError> {
        self.memory.check_and_maybe_collect().await;
        let result = self.run(args).await;
        // 成功或失败都回收
        self.memory.force_aggressive_reclaim().await;
        result
    }
}
