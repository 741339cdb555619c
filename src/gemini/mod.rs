//! Gemini 客户端抽象与实现（REST / Mock）

pub mod client;
pub mod mock;
pub mod types;

pub use client::{GeminiClient, ImageModel, DEFAULT_IMAGE_MODEL};
pub use mock::MockImageModel;
pub use types::{Candidate, Content, GenerateContentResponse, InlineData, Part};
