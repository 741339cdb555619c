//! Azure Blob Storage 后端（REST + Shared Key 签名）
//!
//! 连接串解析 AccountName / AccountKey / EndpointSuffix 等字段；
//! 每个请求按 Shared Key 方案对规范化头与资源做 HMAC-SHA256 签名。
//! 容器创建带 blob 级公开读，上传成功返回的 URL 可直接访问。

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use reqwest::Client;
use ring::hmac;

use crate::storage::object_store::ObjectStore;

const API_VERSION: &str = "2021-08-06";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Azure Blob 后端：一个实例绑定一个容器
#[derive(Debug)]
pub struct AzureBlobStore {
    client: Client,
    account: String,
    key: Vec<u8>,
    endpoint: String,
    container: String,
}

impl AzureBlobStore {
    /// 从连接串构造；容器名单独传入（配置层解析）
    pub fn from_connection_string(conn: &str, container: &str) -> Result<Self, String> {
        let fields = parse_connection_string(conn);
        let account = fields
            .get("AccountName")
            .ok_or("connection string missing AccountName")?
            .clone();
        let key_b64 = fields
            .get("AccountKey")
            .ok_or("connection string missing AccountKey")?;
        let key = STANDARD
            .decode(key_b64)
            .map_err(|e| format!("invalid AccountKey: {e}"))?;

        let protocol = fields
            .get("DefaultEndpointsProtocol")
            .map(String::as_str)
            .unwrap_or("https");
        let suffix = fields
            .get("EndpointSuffix")
            .map(String::as_str)
            .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
        let endpoint = fields
            .get("BlobEndpoint")
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("{protocol}://{account}.blob.{suffix}"));

        Ok(Self {
            client: Client::new(),
            account,
            key,
            endpoint,
            container: container.to_string(),
        })
    }

    pub fn blob_url(&self, name: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.container, name)
    }

    fn container_url(&self) -> String {
        format!("{}/{}?restype=container", self.endpoint, self.container)
    }

    fn canonical_container_resource(&self) -> String {
        format!("/{}/{}\nrestype:container", self.account, self.container)
    }

    fn canonical_blob_resource(&self, name: &str) -> String {
        format!("/{}/{}/{}", self.account, self.container, name)
    }

    fn sign(&self, string_to_sign: &str) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, &self.key);
        let tag = hmac::sign(&key, string_to_sign.as_bytes());
        STANDARD.encode(tag.as_ref())
    }

    fn authorization(
        &self,
        verb: &str,
        content_length: usize,
        content_type: &str,
        ms_headers: &[(&str, String)],
        canonical_resource: &str,
    ) -> String {
        let string_to_sign = string_to_sign(
            verb,
            content_length,
            content_type,
            ms_headers,
            canonical_resource,
        );
        format!("SharedKey {}:{}", self.account, self.sign(&string_to_sign))
    }

    /// `x-ms-*` 头按字典序排列（签名要求），date/version 每请求生成
    fn ms_headers(&self, extra: &[(&'static str, &str)]) -> Vec<(&'static str, String)> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let mut headers: Vec<(&'static str, String)> = vec![
            ("x-ms-date", date),
            ("x-ms-version", API_VERSION.to_string()),
        ];
        for &(name, value) in extra {
            headers.push((name, value.to_string()));
        }
        headers.sort_by(|a, b| a.0.cmp(b.0));
        headers
    }
}

/// `Key=Value;...` 形式解析；AccountKey 的 base64 尾部 `=` 因 split_once 保留完整
fn parse_connection_string(conn: &str) -> HashMap<String, String> {
    conn.split(';')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

/// Shared Key 的 StringToSign：空槽位对应未发送的标准头；
/// Content-Length 为 0 时按协议留空
fn string_to_sign(
    verb: &str,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(&str, String)],
    canonical_resource: &str,
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };
    let canonical_headers: String = ms_headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    format!(
        "{verb}\n\n\n{length}\n\n{content_type}\n\n\n\n\n\n\n{canonical_headers}{canonical_resource}"
    )
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    async fn ensure_container(&self) -> Result<(), String> {
        let ms_headers = self.ms_headers(&[("x-ms-blob-public-access", "blob")]);
        let auth = self.authorization(
            "PUT",
            0,
            "",
            &ms_headers,
            &self.canonical_container_resource(),
        );

        let mut request = self
            .client
            .put(self.container_url())
            .header("Authorization", auth)
            .header("Content-Length", "0");
        for (name, value) in &ms_headers {
            request = request.header(*name, value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("create container request failed: {e}"))?;
        match response.status().as_u16() {
            201 => Ok(()),
            // 已存在：幂等成功
            409 => Ok(()),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(format!("create container failed: HTTP {status}: {body}"))
            }
        }
    }

    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, String> {
        let ms_headers = self.ms_headers(&[("x-ms-blob-type", "BlockBlob")]);
        let auth = self.authorization(
            "PUT",
            bytes.len(),
            content_type,
            &ms_headers,
            &self.canonical_blob_resource(name),
        );

        let url = self.blob_url(name);
        let mut request = self
            .client
            .put(&url)
            .header("Authorization", auth)
            .header("Content-Type", content_type);
        for (name, value) in &ms_headers {
            request = request.header(*name, value.as_str());
        }

        let response = request
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| format!("upload request failed: {e}"))?;
        if response.status().as_u16() == 201 {
            Ok(url)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(format!("upload failed: HTTP {status}: {body}"))
        }
    }

    async fn exists(&self) -> Result<bool, String> {
        let ms_headers = self.ms_headers(&[]);
        let auth = self.authorization(
            "GET",
            0,
            "",
            &ms_headers,
            &self.canonical_container_resource(),
        );

        let mut request = self
            .client
            .get(self.container_url())
            .header("Authorization", auth);
        for (name, value) in &ms_headers {
            request = request.header(*name, value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("container check failed: {e}"))?;
        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(format!("container check failed: HTTP {status}")),
        }
    }
}
