//! 配置解析：环境变量优先，其次工作目录下的 JSON 记录
//!
//! 优先级：进程环境变量（`GEMINI_API_KEY` / `AZURE_STORAGE_CONNECTION_STRING` /
//! `AZURE_STORAGE_CONTAINER_NAME`）→ `nano-banana-config.json`。
//! stdio 传输下客户端注入的环境变量就落在进程环境里，因此两层合一。
//! `configure_gemini_token` 工具通过 [`ConfigStore::save_api_key`] 写回 JSON 记录。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::ServerError;

/// 工作目录下的配置文件名
pub const CONFIG_FILE: &str = "nano-banana-config.json";

/// 远端容器名缺省值（与本地回退目录同族命名）
pub const DEFAULT_CONTAINER_NAME: &str = "nano-banana-images";

const ENV_API_KEY: &str = "GEMINI_API_KEY";
const ENV_CONNECTION_STRING: &str = "AZURE_STORAGE_CONNECTION_STRING";
const ENV_CONTAINER_NAME: &str = "AZURE_STORAGE_CONTAINER_NAME";

/// 磁盘上的配置记录（camelCase 与历史格式保持一致）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigRecord {
    pub gemini_api_key: Option<String>,
    pub azure_storage_connection_string: Option<String>,
    pub azure_storage_container_name: Option<String>,
}

/// API Key 的来源标记（供 get_configuration_status 展示）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Environment,
    ConfigFile,
    Unset,
}

impl ConfigSource {
    pub fn describe(&self) -> &'static str {
        match self {
            ConfigSource::Environment => "environment variable GEMINI_API_KEY",
            ConfigSource::ConfigFile => CONFIG_FILE,
            ConfigSource::Unset => "not configured",
        }
    }
}

/// 解析后的配置：核心各处只消费这个结构
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub gemini_api_key: Option<String>,
    pub azure_connection_string: Option<String>,
    pub container_name: String,
    pub source: ConfigSource,
}

impl ResolvedConfig {
    /// 人类可读的配置状态描述
    pub fn describe(&self) -> String {
        let key_line = match (&self.gemini_api_key, self.source) {
            (Some(_), source) => format!("Gemini API key: configured (source: {})", source.describe()),
            (None, _) => "Gemini API key: not configured".to_string(),
        };
        let storage_line = if self.azure_connection_string.is_some() {
            format!(
                "Azure Blob Storage: configured (container: {})",
                self.container_name
            )
        } else {
            "Azure Blob Storage: not configured, images will be saved locally".to_string()
        };
        format!("{key_line}\n{storage_line}")
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// 配置存取：每次调用都重新读取环境与文件，保证 configure 之后立即生效。
/// 环境查找是可注入的函数指针，测试里换成固定映射以隔离进程环境。
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    env_lookup: fn(&str) -> Option<String>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(PathBuf::from(CONFIG_FILE))
    }
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env_lookup: process_env,
        }
    }

    /// 指定环境查找的构造（测试隔离进程环境用）
    pub fn with_env_lookup(
        path: impl Into<PathBuf>,
        env_lookup: fn(&str) -> Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            env_lookup,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 按优先级解析当前配置
    pub fn resolve(&self) -> ResolvedConfig {
        self.resolve_with(self.env_lookup)
    }

    fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> ResolvedConfig {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let record = self.read_record().unwrap_or_default();

        let (gemini_api_key, source) = match env(ENV_API_KEY) {
            Some(key) => (Some(key), ConfigSource::Environment),
            None => match record.gemini_api_key.filter(|v| !v.trim().is_empty()) {
                Some(key) => (Some(key), ConfigSource::ConfigFile),
                None => (None, ConfigSource::Unset),
            },
        };

        let azure_connection_string =
            env(ENV_CONNECTION_STRING).or(record.azure_storage_connection_string);
        let container_name = env(ENV_CONTAINER_NAME)
            .or(record.azure_storage_container_name)
            .unwrap_or_else(|| DEFAULT_CONTAINER_NAME.to_string());

        ResolvedConfig {
            gemini_api_key,
            azure_connection_string,
            container_name,
            source,
        }
    }

    fn read_record(&self) -> Option<ConfigRecord> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Ignoring malformed {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// 保存 API Key：保留记录中已有的存储配置字段
    pub fn save_api_key(&self, api_key: &str) -> Result<(), ServerError> {
        let mut record = self.read_record().unwrap_or_default();
        record.gemini_api_key = Some(api_key.to_string());
        let content = serde_json::to_string_pretty(&record)
            .map_err(|e| ServerError::Config(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| {
            ServerError::Config(format!("failed to write {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }
}
