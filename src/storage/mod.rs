//! Unified object storage contract / 统一对象存储接口

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::models::{
    CopyOptions, GetObjectResult, HeadOptions, ListOptions, ListPage, ListPageV2, ListV2Options,
    MetaMap, Payload, PutOptions, SignatureUrlOptions,
};

pub mod base;
pub mod compression;
pub mod meta;
pub mod resolver;
pub mod retry;
pub mod unified;

pub use unified::ObjectStorage;

/// Object storage contract implemented once per backend / 对象存储适配器接口
///
/// Adapters hold no state between calls besides their client handle, so
/// listing cursors are always passed back in by the caller.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name / 后端名称
    fn name(&self) -> &str;

    /// Read an object as text; `None` when it does not exist / 读取文本
    async fn get(&self, key: &str, meta_keys: &[&str]) -> Result<Option<GetObjectResult<String>>> {
        let result = self.get_as_buffer(key, meta_keys).await?;
        Ok(result.map(|r| GetObjectResult {
            content: String::from_utf8_lossy(&r.content).into_owned(),
            meta: r.meta,
            headers: r.headers,
        }))
    }

    /// Read an object as bytes; `None` when it does not exist / 读取二进制
    async fn get_as_buffer(
        &self,
        key: &str,
        meta_keys: &[&str],
    ) -> Result<Option<GetObjectResult<Bytes>>>;

    /// Write an object / 写入对象
    async fn put(&self, key: &str, data: Payload, options: PutOptions) -> Result<()>;

    /// Server-side copy, retried on transient failures / 服务端复制
    async fn copy(&self, dest_key: &str, source_key: &str, options: CopyOptions) -> Result<()>;

    /// Delete an object; deleting a missing key is not an error / 删除对象
    async fn del(&self, key: &str) -> Result<()>;

    /// Quiet multi-delete in the bucket of the first key; returns the keys
    /// the backend confirmed / 批量删除
    async fn del_multi(&self, keys: &[String]) -> Result<Vec<String>>;

    /// Object metadata; `None` when it does not exist / 获取元数据
    async fn head(&self, key: &str, options: HeadOptions) -> Result<Option<MetaMap>>;

    /// Flat v1 key listing / v1列举键
    async fn list_object(&self, key: &str, options: ListOptions) -> Result<Vec<String>> {
        let page = self.list_details(key, options).await?;
        Ok(page.objects.into_iter().map(|o| o.key).collect())
    }

    /// Flat v2 key listing / v2列举键
    async fn list_object_v2(&self, key: &str, options: ListV2Options) -> Result<Vec<String>> {
        let page = self.list_details_v2(key, options).await?;
        Ok(page.objects.into_iter().map(|o| o.key).collect())
    }

    /// v1 listing page (marker cursor) / v1列举详情
    async fn list_details(&self, key: &str, options: ListOptions) -> Result<ListPage>;

    /// v2 listing page (continuation token cursor) / v2列举详情
    async fn list_details_v2(&self, key: &str, options: ListV2Options) -> Result<ListPageV2>;

    /// Pre-signed URL, `None` if the backend cannot produce one / 生成签名URL
    async fn signature_url(&self, key: &str, options: SignatureUrlOptions)
        -> Result<Option<String>>;
}
