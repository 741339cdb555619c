//! 存储路由：远端优先，本地回退
//!
//! 远端后端按进程懒初始化一次：首次使用时读取当前配置（环境变量优先），
//! 构造 Azure 后端、探活容器并按需创建；任何一步失败只记 warn 并钉死为 absent，
//! 绝不作为致命错误向上传播。初始化全程持有槽位锁，
//! 两个挂起中的初始化不可能跨 await 交错。

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::ConfigStore;
use crate::core::ServerError;
use crate::storage::azure::AzureBlobStore;
use crate::storage::local;
use crate::storage::object_store::ObjectStore;
use crate::storage::{ArtifactLocation, PersistedArtifact};

/// 远端后端槽位：未初始化 / 就绪 / 确认缺席（本进程内不再重试）
enum BackendSlot {
    Uninit,
    Ready(Arc<dyn ObjectStore>),
    Absent,
}

/// 每个图像负载的持久化入口；进程内共享一个实例
pub struct StorageRouter {
    slot: Mutex<BackendSlot>,
    config: Arc<ConfigStore>,
    local_dir: Option<PathBuf>,
}

impl StorageRouter {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            slot: Mutex::new(BackendSlot::Uninit),
            config,
            local_dir: None,
        }
    }

    /// 固定本地回退目录（测试或部署覆盖）
    pub fn with_local_dir(mut self, dir: PathBuf) -> Self {
        self.local_dir = Some(dir);
        self
    }

    /// 注入现成后端（跳过懒初始化；测试用）
    pub fn with_backend(self, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            slot: Mutex::new(BackendSlot::Ready(store)),
            ..self
        }
    }

    /// 容器预检：已存在则跳过创建请求
    async fn prepare_container(store: &dyn ObjectStore) -> Result<(), String> {
        if store.exists().await? {
            return Ok(());
        }
        store.ensure_container().await
    }

    /// 懒初始化：锁内完成配置读取、后端构造与容器预检
    async fn ensure_backend(&self) -> Option<Arc<dyn ObjectStore>> {
        let mut slot = self.slot.lock().await;
        match &*slot {
            BackendSlot::Ready(store) => return Some(store.clone()),
            BackendSlot::Absent => return None,
            BackendSlot::Uninit => {}
        }

        let config = self.config.resolve();
        let Some(conn) = config.azure_connection_string else {
            tracing::debug!("No Azure Storage configuration, using local fallback");
            *slot = BackendSlot::Absent;
            return None;
        };

        match AzureBlobStore::from_connection_string(&conn, &config.container_name) {
            Ok(store) => {
                let store: Arc<dyn ObjectStore> = Arc::new(store);
                match Self::prepare_container(store.as_ref()).await {
                    Ok(()) => {
                        tracing::info!(
                            container = %config.container_name,
                            "Azure Blob Storage backend ready"
                        );
                        *slot = BackendSlot::Ready(store.clone());
                        Some(store)
                    }
                    Err(e) => {
                        tracing::warn!("Azure container init failed, using local fallback: {e}");
                        *slot = BackendSlot::Absent;
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Invalid Azure connection string, using local fallback: {e}");
                *slot = BackendSlot::Absent;
                None
            }
        }
    }

    /// 持久化一段字节：远端成功返回 URL，否则本地落盘返回路径。
    /// 结果恒为二者其一；仅本地 I/O 失败向上传播。
    pub async fn persist(
        &self,
        bytes: &[u8],
        name: &str,
        content_type: &str,
    ) -> Result<PersistedArtifact, ServerError> {
        if let Some(store) = self.ensure_backend().await {
            match store.upload(name, bytes, content_type).await {
                Ok(url) => {
                    return Ok(PersistedArtifact {
                        location: ArtifactLocation::Remote(url),
                        size_bytes: bytes.len() as u64,
                    });
                }
                Err(e) => {
                    tracing::warn!("Blob upload failed, falling back to local: {e}");
                }
            }
        }

        let dir = self
            .local_dir
            .clone()
            .unwrap_or_else(local::fallback_dir);
        let path = local::save_image(&dir, name, bytes).await?;
        Ok(PersistedArtifact {
            location: ArtifactLocation::Local(path),
            size_bytes: bytes.len() as u64,
        })
    }
}
