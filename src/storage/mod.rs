//! 存储层：远端对象存储（Azure Blob）、本地回退与路由

pub mod azure;
pub mod local;
pub mod object_store;
pub mod router;

use std::path::PathBuf;

pub use azure::AzureBlobStore;
pub use object_store::ObjectStore;
pub use router::StorageRouter;

/// 持久化结果位置：远端 URL 或本地路径，恒为其一
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    Remote(String),
    Local(PathBuf),
}

/// 一个成功持久化的图像工件
#[derive(Debug, Clone)]
pub struct PersistedArtifact {
    pub location: ArtifactLocation,
    pub size_bytes: u64,
}

impl PersistedArtifact {
    /// 远端 URL（本地回退时为 None；结果负载只上报远端 URL）
    pub fn remote_url(&self) -> Option<&str> {
        match &self.location {
            ArtifactLocation::Remote(url) => Some(url),
            ArtifactLocation::Local(_) => None,
        }
    }
}
