//! Unified façade / 统一存储入口
//!
//! Selects one adapter at construction and delegates every call to it.
//! The only rule enforced here is the 1000-key ceiling of `del_multi`.

use std::sync::Arc;

use bytes::Bytes;

use super::ObjectStore;
use crate::config::{BackendConfig, StorageOptions, ValidatedConfig};
use crate::drivers::oss::{HttpOssClient, OssAdapter, OssClient};
use crate::drivers::s3::{HttpS3Client, S3Adapter, S3Client};
use crate::error::{Result, StorageError};
use crate::models::{
    CopyOptions, GetObjectResult, HeadOptions, ListOptions, ListPage, ListPageV2, ListV2Options,
    MetaMap, Payload, PutOptions, SignatureUrlOptions, MAX_DELETE_KEYS,
};

/// The selected backend / 当前后端
enum Adapter {
    S3(S3Adapter),
    Oss(OssAdapter),
}

impl Adapter {
    fn store(&self) -> &dyn ObjectStore {
        match self {
            Adapter::S3(a) => a,
            Adapter::Oss(a) => a,
        }
    }
}

/// Object storage over S3 or OSS / 统一对象存储
pub struct ObjectStorage {
    adapter: Adapter,
}

impl ObjectStorage {
    /// Validate options and connect over HTTP / 校验配置并创建HTTP客户端
    pub fn new(options: StorageOptions) -> Result<Self> {
        let ValidatedConfig { backend, base } = options.validate()?;
        let adapter = match backend {
            BackendConfig::S3(settings) => {
                let client = HttpS3Client::new(&settings)?;
                Adapter::S3(S3Adapter::new(Arc::new(client), base))
            }
            BackendConfig::Oss(settings) => {
                let client = HttpOssClient::new(&settings)?;
                Adapter::Oss(OssAdapter::new(Arc::new(client), base))
            }
        };
        Ok(Self::ready(adapter))
    }

    fn ready(adapter: Adapter) -> Self {
        let storage = Self { adapter };
        tracing::info!("Object storage ready: backend={}", storage.backend());
        storage
    }

    /// Use a caller-supplied S3 client; options are still fully validated
    pub fn with_s3_client(options: StorageOptions, client: Arc<dyn S3Client>) -> Result<Self> {
        match options.validate()? {
            ValidatedConfig {
                backend: BackendConfig::S3(_),
                base,
            } => Ok(Self::ready(Adapter::S3(S3Adapter::new(client, base)))),
            _ => Err(StorageError::Config(
                "backendType is not s3/aws but an S3 client was supplied".to_string(),
            )),
        }
    }

    /// Use a caller-supplied OSS client; options are still fully validated
    pub fn with_oss_client(options: StorageOptions, client: Arc<dyn OssClient>) -> Result<Self> {
        match options.validate()? {
            ValidatedConfig {
                backend: BackendConfig::Oss(_),
                base,
            } => Ok(Self::ready(Adapter::Oss(OssAdapter::new(client, base)))),
            _ => Err(StorageError::Config(
                "backendType is not oss but an OSS client was supplied".to_string(),
            )),
        }
    }

    /// `"s3"` or `"oss"`
    pub fn backend(&self) -> &str {
        self.adapter.store().name()
    }

    pub async fn get(
        &self,
        key: &str,
        meta_keys: &[&str],
    ) -> Result<Option<GetObjectResult<String>>> {
        self.adapter.store().get(key, meta_keys).await
    }

    pub async fn get_as_buffer(
        &self,
        key: &str,
        meta_keys: &[&str],
    ) -> Result<Option<GetObjectResult<Bytes>>> {
        self.adapter.store().get_as_buffer(key, meta_keys).await
    }

    pub async fn put(
        &self,
        key: &str,
        data: impl Into<Payload>,
        options: PutOptions,
    ) -> Result<()> {
        self.adapter.store().put(key, data.into(), options).await
    }

    pub async fn copy(&self, dest_key: &str, source_key: &str, options: CopyOptions) -> Result<()> {
        self.adapter.store().copy(dest_key, source_key, options).await
    }

    pub async fn del(&self, key: &str) -> Result<()> {
        self.adapter.store().del(key).await
    }

    /// Delete up to 1000 keys in one request / 批量删除（最多1000个）
    pub async fn del_multi(&self, keys: &[String]) -> Result<Vec<String>> {
        if keys.len() > MAX_DELETE_KEYS {
            return Err(StorageError::InvalidInput(format!(
                "del_multi accepts at most {} keys, got {}",
                MAX_DELETE_KEYS,
                keys.len()
            )));
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.adapter.store().del_multi(keys).await
    }

    pub async fn head(&self, key: &str, options: HeadOptions) -> Result<Option<MetaMap>> {
        self.adapter.store().head(key, options).await
    }

    pub async fn list_object(&self, key: &str, options: ListOptions) -> Result<Vec<String>> {
        self.adapter.store().list_object(key, options).await
    }

    pub async fn list_object_v2(&self, key: &str, options: ListV2Options) -> Result<Vec<String>> {
        self.adapter.store().list_object_v2(key, options).await
    }

    pub async fn list_details(&self, key: &str, options: ListOptions) -> Result<ListPage> {
        self.adapter.store().list_details(key, options).await
    }

    pub async fn list_details_v2(&self, key: &str, options: ListV2Options) -> Result<ListPageV2> {
        self.adapter.store().list_details_v2(key, options).await
    }

    pub async fn signature_url(
        &self,
        key: &str,
        options: SignatureUrlOptions,
    ) -> Result<Option<String>> {
        self.adapter.store().signature_url(key, options).await
    }
}
