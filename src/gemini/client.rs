//! Gemini 图像模型客户端
//!
//! 所有实现（REST / Mock）走 ImageModel trait；API Key 每次调用传入，
//! 因为 configure_gemini_token 可以在进程存活期间改变配置。

use async_trait::async_trait;
use reqwest::Client;

use crate::core::ServerError;
use crate::gemini::types::{
    ApiErrorBody, Content, GenerateContentRequest, GenerateContentResponse, Part,
};

/// 缺省图像模型
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// 图像模型 trait：一次 generateContent 调用，输入 parts，输出结构化 parts
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate(
        &self,
        api_key: &str,
        parts: Vec<Part>,
    ) -> Result<GenerateContentResponse, ServerError>;
}

/// REST 实现：POST {API_BASE}/{model}:generateContent，Key 走 x-goog-api-key 头
pub struct GeminiClient {
    client: Client,
    model: String,
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl ImageModel for GeminiClient {
    async fn generate(
        &self,
        api_key: &str,
        parts: Vec<Part>,
    ) -> Result<GenerateContentResponse, ServerError> {
        let url = format!("{}/{}:generateContent", API_BASE, self.model);
        let body = GenerateContentRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ServerError::ModelCall(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // 优先取结构化错误体里的 message，拿不到就带原始响应
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            return Err(ServerError::ModelCall(format!("HTTP {status}: {message}")));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| ServerError::ModelCall(format!("invalid response body: {e}")))
    }
}
