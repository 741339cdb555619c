//! 服务器错误类型
//!
//! 与 RPC 层配合：按「请求类错误 / 内部错误」两类映射 JSON-RPC 错误码，
//! 消息中内嵌底层原因描述，供客户端直接展示。

use thiserror::Error;

/// 工具调用过程中可能出现的错误（配置缺失、模型调用、图像解码、本地存储等）
#[derive(Error, Debug)]
pub enum ServerError {
    /// API Key 未配置：属于请求类错误，在发起模型调用前就返回
    #[error("Gemini API key not configured. Use configure_gemini_token or set GEMINI_API_KEY")]
    MissingApiKey,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Gemini API error: {0}")]
    ModelCall(String),

    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    /// 主图像加载失败（路径或 URL + 原因）；参考图失败不会走到这里，见 pipeline
    #[error("Failed to load image {0}: {1}")]
    ImageLoad(String, String),

    /// 本地写盘失败：主图像落盘属于致命错误，直接向上传播
    #[error("Local storage error: {0}")]
    LocalStore(#[from] std::io::Error),

    #[error("Config store error: {0}")]
    Config(String),
}

impl ServerError {
    /// 是否为请求类错误（参数/配置问题，非服务端内部故障）
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            ServerError::MissingApiKey | ServerError::InvalidRequest(_)
        )
    }

    /// 映射 JSON-RPC 错误码：请求类 -32602，其余 -32603
    pub fn rpc_code(&self) -> i64 {
        if self.is_invalid_request() {
            crate::rpc::protocol::INVALID_PARAMS
        } else {
            crate::rpc::protocol::INTERNAL_ERROR
        }
    }
}
