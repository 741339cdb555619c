//! 远端对象存储抽象
//!
//! 所有后端（Azure Blob / 测试 Mock）实现 ObjectStore：确保容器存在、上传、探活。

use async_trait::async_trait;

/// 对象存储 trait：容器幂等创建、按名上传（返回公开 URL）、容器探活
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 容器不存在则创建（blob 级公开读）；已存在视为成功
    async fn ensure_container(&self) -> Result<(), String>;

    /// 按名上传字节，返回可直接访问的 URL
    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, String>;

    /// 容器是否存在
    async fn exists(&self) -> Result<bool, String>;
}
