//! 图像负载流水线：逐 part 解码 → 持久化 → 释放
//!
//! 缓冲纪律靠所有权表达：响应按值移入，inlineData 从 part 中取出后
//! 整个 part 随即销毁，解码出的裸字节在本轮迭代结束即释放——
//! 任意时刻至多存在一份活着的解码缓冲，返回前响应结构已不可达。
//!
//! 另外负责 edit_image 的输入图像加载：本地路径或远端 URL，
//! 主图失败致命，参考图尽力而为（失败记 warn 并跳过）。

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use reqwest::Client;
use uuid::Uuid;

use crate::core::ServerError;
use crate::gemini::types::GenerateContentResponse;
use crate::storage::{PersistedArtifact, StorageRouter};

/// 图像输入引用：URL 前缀判定远端，否则按本地路径处理
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Local(PathBuf),
    Remote(String),
}

impl ImageRef {
    pub fn parse(input: &str) -> Self {
        if input.starts_with("http://") || input.starts_with("https://") {
            ImageRef::Remote(input.to_string())
        } else {
            ImageRef::Local(PathBuf::from(input))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ImageRef::Local(path) => path.display().to_string(),
            ImageRef::Remote(url) => url.clone(),
        }
    }
}

/// 加载完成的一张输入图像
#[derive(Debug)]
pub struct LoadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// 输入图像加载器（本地读 + 远端抓取）
pub struct ImageLoader {
    client: Client,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageLoader {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// 加载一张图像；失败返回 ImageLoad（主图路径上视为致命）
    pub async fn load(&self, image: &ImageRef) -> Result<LoadedImage, ServerError> {
        match image {
            ImageRef::Local(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| ServerError::ImageLoad(path.display().to_string(), e.to_string()))?;
                Ok(LoadedImage {
                    bytes,
                    mime_type: mime_for_path(path).to_string(),
                })
            }
            ImageRef::Remote(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| ServerError::ImageLoad(url.clone(), e.to_string()))?;
                if !response.status().is_success() {
                    return Err(ServerError::ImageLoad(
                        url.clone(),
                        format!("HTTP {}", response.status()),
                    ));
                }
                let mime_type = response
                    .headers()
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
                    .filter(|v| v.starts_with("image/"))
                    .unwrap_or_else(|| mime_for_path(Path::new(url)).to_string());
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ServerError::ImageLoad(url.clone(), e.to_string()))?
                    .to_vec();
                Ok(LoadedImage { bytes, mime_type })
            }
        }
    }

    /// 参考图批量加载：逐张尽力而为，失败的跳过并记 warn
    pub async fn load_references(&self, images: &[ImageRef]) -> Vec<LoadedImage> {
        let mut loaded = Vec::new();
        for image in images {
            match self.load(image).await {
                Ok(img) => loaded.push(img),
                Err(e) => {
                    tracing::warn!("Skipping reference image {}: {e}", image.describe());
                }
            }
        }
        loaded
    }
}

/// 按扩展名推断 MIME（未知扩展按 PNG 处理）
fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// 生成工件名：generated-<毫秒时间戳>-<短 id>.<扩展名>
pub fn artifact_name(mime_type: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!(
        "generated-{}-{}.{}",
        Utc::now().timestamp_millis(),
        &id[..8],
        extension_for_mime(mime_type)
    )
}

/// 逐 part 持久化响应里的全部内联图像。
/// 响应按值消费；每个 part 的解码缓冲在持久化返回后立即释放。
/// 解码或持久化失败（主路径）直接向上传播。
pub async fn persist_inline_images(
    response: GenerateContentResponse,
    storage: &StorageRouter,
) -> Result<Vec<PersistedArtifact>, ServerError> {
    let mut artifacts = Vec::new();
    for candidate in response.candidates {
        for part in candidate.content.parts {
            let Some(inline) = part.inline_data else {
                continue;
            };
            let mime_type = inline.mime_type;
            let bytes = STANDARD
                .decode(inline.data.as_bytes())
                .map_err(|e| ServerError::ImageDecode(e.to_string()))?;
            // 传输编码副本到此为止，只剩解码后的裸字节
            drop(inline.data);

            let name = artifact_name(&mime_type);
            let artifact = storage.persist(&bytes, &name, &mime_type).await?;
            tracing::info!(
                name = %name,
                size_bytes = artifact.size_bytes,
                remote = artifact.remote_url().is_some(),
                "Image persisted"
            );
            artifacts.push(artifact);
        }
    }
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use crate::gemini::mock::TINY_PNG_B64;
    use crate::gemini::types::{Candidate, Content, InlineData, Part};
    use std::sync::Arc;

    fn local_router(dir: &Path) -> StorageRouter {
        StorageRouter::new(Arc::new(ConfigStore::new(dir.join("config.json"))))
            .with_local_dir(dir.join("imgs"))
    }

    fn inline_response(parts: Vec<Part>) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Content { parts },
            }],
        }
    }

    #[test]
    fn test_image_ref_parse() {
        assert_eq!(
            ImageRef::parse("https://example.com/a.png"),
            ImageRef::Remote("https://example.com/a.png".to_string())
        );
        assert_eq!(
            ImageRef::parse("/tmp/a.png"),
            ImageRef::Local(PathBuf::from("/tmp/a.png"))
        );
        // 非 URL scheme 的冒号仍按路径处理
        assert_eq!(
            ImageRef::parse("C:\\imgs\\a.png"),
            ImageRef::Local(PathBuf::from("C:\\imgs\\a.png"))
        );
    }

    #[test]
    fn test_artifact_name_shape() {
        let name = artifact_name("image/png");
        assert!(name.starts_with("generated-"));
        assert!(name.ends_with(".png"));
        assert_eq!(name.matches('-').count(), 2);

        assert!(artifact_name("image/jpeg").ends_with(".jpg"));
        assert!(artifact_name("application/octet-stream").ends_with(".png"));
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("noext")), "image/png");
    }

    #[tokio::test]
    async fn test_persist_inline_images_writes_each_binary_part() {
        let tmp = tempfile::tempdir().unwrap();
        let router = local_router(tmp.path());
        let response = inline_response(vec![
            Part::text("description"),
            Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: "image/png".to_string(),
                    data: TINY_PNG_B64.to_string(),
                }),
            },
        ]);

        let artifacts = persist_inline_images(response, &router).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert!(artifacts[0].size_bytes > 0);
        assert!(artifacts[0].remote_url().is_none());
        let files: Vec<_> = std::fs::read_dir(tmp.path().join("imgs"))
            .unwrap()
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_text_only_response_yields_no_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let router = local_router(tmp.path());
        let response = inline_response(vec![Part::text("no image today")]);
        let artifacts = persist_inline_images(response, &router).await.unwrap();
        assert!(artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_base64_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let router = local_router(tmp.path());
        let response = inline_response(vec![Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: "image/png".to_string(),
                data: "not!!valid!!base64".to_string(),
            }),
        }]);
        let err = persist_inline_images(response, &router).await.unwrap_err();
        assert!(matches!(err, ServerError::ImageDecode(_)));
    }

    #[tokio::test]
    async fn test_loader_skips_failing_reference_images() {
        let tmp = tempfile::tempdir().unwrap();
        let good1 = tmp.path().join("one.png");
        let good2 = tmp.path().join("three.png");
        std::fs::write(&good1, b"one").unwrap();
        std::fs::write(&good2, b"three").unwrap();

        let loader = ImageLoader::new();
        let refs = vec![
            ImageRef::Local(good1),
            ImageRef::Local(tmp.path().join("missing.png")),
            ImageRef::Local(good2),
        ];
        let loaded = loader.load_references(&refs).await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].bytes, b"one");
        assert_eq!(loaded[1].bytes, b"three");
    }

    #[tokio::test]
    async fn test_loader_primary_failure_is_an_error() {
        let loader = ImageLoader::new();
        let err = loader
            .load(&ImageRef::Local(PathBuf::from("/nonexistent/a.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::ImageLoad(_, _)));
    }
}
