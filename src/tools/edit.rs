//! edit_image 工具：图生图（主图 + 可选参考图）
//!
//! 主图加载失败致命；参考图尽力而为，失败的只从外发请求里剔除。
//! 调用序与 generate_image 相同：压力检查 → 模型调用 → 持久化 → 激进回收。

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
use crate::pipeline::{self, ImageLoader, ImageRef};
use crate::storage::StorageRouter;
use crate::tools::Tool;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct EditImageArgs {
    /// 待编辑图像：本地路径或 URL
    image_path: String,
    /// 编辑提示词
    prompt: String,
    /// 参考图（路径或 URL，可选；加载失败的会被跳过）
    #[serde(default)]
    reference_images: Vec<String>,
}

pub struct EditImageTool {
    config: Arc<ConfigStore>,
    model: Arc<dyn ImageModel>,
    storage: Arc<StorageRouter>,
    memory: Arc<MemoryPressureController>,
    loader: ImageLoader,
}

impl EditImageTool {
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
            loader: ImageLoader::new(),
        }
    }

    async fn run(&self, args: Value) -> Result<String, ServerError> {
        let args: EditImageArgs = serde_json::from_value(args)
            .map_err(|e| ServerError::InvalidRequest(format!("invalid arguments: {e}")))?;

        let config = self.config.resolve();
        let api_key = config.gemini_api_key.ok_or(ServerError::MissingApiKey)?;

        // 主图：失败直接向上传播
        let primary = self.loader.load(&ImageRef::parse(&args.image_path)).await?;

        // 参考图：逐张尽力而为
        let reference_refs: Vec<ImageRef> = args
            .reference_images
            .iter()
            .map(|s| ImageRef::parse(s))
            .collect();
        let references = self.loader.load_references(&reference_refs).await;

        let mut parts = Vec::with_capacity(2 + references.len());
        parts.push(Part::text(&args.prompt));
        parts.push(Part::inline_image(primary.mime_type, &primary.bytes));
        drop(primary.bytes);
        for image in references {
            parts.push(Part::inline_image(image.mime_type, &image.bytes));
        }

        let response = self.model.generate(&api_key, parts).await?;
        let artifacts = pipeline::persist_inline_images(response, &self.storage).await?;

        let remote_url = artifacts
            .iter()
            .find_map(|a| a.remote_url())
            .map(str::to_string);
        Ok(serde_json::json!({ "remoteUrl": remote_url }).to_string())
    }
}

#[async_trait]
impl Tool for EditImageTool {
    fn name(&self) -> &str {
        "edit_image"
    }

    fn description(&self) -> &str {
        "Edit an image (local path or URL) with Gemini, optionally guided by \
         reference images. Args: {\"imagePath\": \"...\", \"prompt\": \"...\", \
         \"referenceImages\": [\"...\"]}"
    }

    fn input_schema(&self) -> Value {
        serde_json::to_value(schema_for!(EditImageArgs)).unwrap_or_default()
    }

    async fn execute(&self, args: Value) -> Result<String, ServerError> {
        self.memory.check_and_maybe_collect().await;
        let result = self.run(args).await;
        // 成功或失败都回收
        self.memory.force_aggressive_reclaim().await;
        result
    }
}
