//! Mock 图像模型（用于测试，无需 API）
//!
//! 缺省回放一张 1x1 PNG 的 inlineData part，便于本地跑通完整的
//! 解码 → 落盘 → 回收流程。

use async_trait::async_trait;

use crate::core::ServerError;
use crate::gemini::client::ImageModel;
use crate::gemini::types::{Candidate, Content, GenerateContentResponse, InlineData, Part};

/// 1x1 透明 PNG（base64）
pub const TINY_PNG_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Mock 客户端：忽略 API Key，回放预置 parts
pub struct MockImageModel {
    parts: Vec<Part>,
}

impl Default for MockImageModel {
    fn default() -> Self {
        Self {
            parts: vec![Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: "image/png".to_string(),
                    data: TINY_PNG_B64.to_string(),
                }),
            }],
        }
    }
}

impl MockImageModel {
    /// 指定回放的 parts（如文本-only 响应或多图响应）
    pub fn with_parts(parts: Vec<Part>) -> Self {
        Self { parts }
    }
}

#[async_trait]
impl ImageModel for MockImageModel {
    async fn generate(
        &self,
        _api_key: &str,
        _parts: Vec<Part>,
    ) -> Result<GenerateContentResponse, ServerError> {
        Ok(GenerateContentResponse {
            candidates: vec![Candidate {
                content: Content {
                    parts: self.parts.clone(),
                },
            }],
        })
    }
}
