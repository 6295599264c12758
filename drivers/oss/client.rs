//! OSS client capability / OSS客户端接口
//!
//! Shaped like the Alibaba Cloud SDK: reads hand back the raw response
//! headers (user metadata still carries its `x-oss-meta-` prefix), listings
//! carry timestamps as the strings the service sent, and every failure is
//! one error type carrying `status`/`code`/`requestId`.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::error::is_transient_status;
use crate::models::SignMethod;

pub const OSS_META_PREFIX: &str = "x-oss-meta-";

/// OSS error / OSS错误
#[derive(Error, Debug)]
pub enum OssError {
    #[error("OSS error {status} {code}: {message} (request id: {request_id})")]
    Server {
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },

    #[error("OSS request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OSS response decode failed: {0}")]
    Decode(String),

    #[error("OSS invalid request: {0}")]
    InvalidRequest(String),
}

impl OssError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, OssError::Server { code, .. } if code == "NoSuchKey")
    }

    pub fn is_transient(&self) -> bool {
        match self {
            OssError::Server { status, code, .. } => is_transient_status(*status, code),
            OssError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

/// Status line and lowercase headers of a response
#[derive(Debug, Clone, Default)]
pub struct OssResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct OssGetResult {
    pub content: Bytes,
    pub res: OssResponse,
}

/// Write options; `meta` is sent as `x-oss-meta-*` / 上传选项
#[derive(Debug, Clone, Default)]
pub struct OssPutOptions {
    pub mime: Option<String>,
    pub meta: HashMap<String, String>,
    pub headers: HashMap<String, String>,
}

/// `meta: Some(..)` replaces the destination metadata, `None` copies it
#[derive(Debug, Clone, Default)]
pub struct OssCopyOptions {
    pub meta: Option<HashMap<String, String>>,
    pub mime: Option<String>,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct OssDeleteMultiResult {
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OssObjectMeta {
    pub name: String,
    /// ISO-8601 string as sent by the service
    pub last_modified: String,
    pub etag: Option<String>,
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct OssListQuery {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub marker: Option<String>,
    pub max_keys: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct OssListResult {
    pub objects: Vec<OssObjectMeta>,
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OssListV2Query {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
    pub max_keys: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct OssListV2Result {
    pub objects: Vec<OssObjectMeta>,
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
    pub key_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct OssSignatureOptions {
    pub expires: u64,
    pub method: SignMethod,
}

/// OSS protocol client / OSS协议客户端
#[async_trait]
pub trait OssClient: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<OssGetResult, OssError>;

    async fn head(&self, bucket: &str, key: &str) -> Result<OssResponse, OssError>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        options: OssPutOptions,
    ) -> Result<OssResponse, OssError>;

    async fn copy(
        &self,
        bucket: &str,
        key: &str,
        source_bucket: &str,
        source_key: &str,
        options: OssCopyOptions,
    ) -> Result<OssResponse, OssError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<OssResponse, OssError>;

    async fn delete_multi(
        &self,
        bucket: &str,
        keys: &[String],
        quiet: bool,
    ) -> Result<OssDeleteMultiResult, OssError>;

    async fn list(&self, bucket: &str, query: OssListQuery) -> Result<OssListResult, OssError>;

    async fn list_v2(
        &self,
        bucket: &str,
        query: OssListV2Query,
    ) -> Result<OssListV2Result, OssError>;

    /// Signed URL computed locally / 本地计算签名URL
    fn signature_url(
        &self,
        bucket: &str,
        key: &str,
        options: OssSignatureOptions,
    ) -> Result<String, OssError>;
}
