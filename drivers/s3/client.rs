//! S3 client capability / S3客户端接口
//!
//! Request and response shapes follow the S3 API: metadata arrives already
//! parsed into a map, listing v1 and v2 have their own outputs, and a missing
//! object is signalled by typed errors.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::is_transient_status;
use crate::models::SignMethod;

/// S3 error / S3错误
#[derive(Error, Debug)]
pub enum S3Error {
    /// GET on a missing key
    #[error("NoSuchKey: {0}")]
    NoSuchKey(String),

    /// HEAD on a missing key (no response body)
    #[error("NotFound")]
    NotFound,

    /// Any other error response / 其他服务端错误
    #[error("S3 error {status} {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    #[error("S3 request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("S3 response decode failed: {0}")]
    Decode(String),

    /// Request could not be built or signed / 请求无法构建
    #[error("S3 invalid request: {0}")]
    InvalidRequest(String),
}

impl S3Error {
    pub fn is_not_found(&self) -> bool {
        match self {
            S3Error::NoSuchKey(_) | S3Error::NotFound => true,
            S3Error::Service { code, .. } => code == "NoSuchKey",
            _ => false,
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            S3Error::Service { status, code, .. } => is_transient_status(*status, code),
            S3Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

/// Bucket and key of one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: &str, key: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetObjectOutput {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub content_encoding: Option<String>,
    pub e_tag: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct HeadObjectOutput {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub content_encoding: Option<String>,
    pub accept_ranges: Option<String>,
    pub e_tag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct PutObjectInput {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// `x-amz-metadata-directive`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataDirective {
    Copy,
    Replace,
}

impl MetadataDirective {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataDirective::Copy => "COPY",
            MetadataDirective::Replace => "REPLACE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CopyObjectInput {
    pub bucket: String,
    pub key: String,
    pub source_bucket: String,
    pub source_key: String,
    pub metadata_directive: MetadataDirective,
    pub metadata: HashMap<String, String>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeleteObjectsInput {
    pub bucket: String,
    pub keys: Vec<String>,
    pub quiet: bool,
}

/// Per-key failure reported by DeleteObjects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteObjectError {
    pub key: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteObjectsOutput {
    pub deleted: Vec<String>,
    pub errors: Vec<DeleteObjectError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Object {
    pub key: String,
    pub e_tag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ListObjectsInput {
    pub bucket: String,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub marker: Option<String>,
    pub max_keys: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct ListObjectsOutput {
    pub contents: Vec<S3Object>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    /// Only returned by S3 when a delimiter was sent
    pub next_marker: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListObjectsV2Input {
    pub bucket: String,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
    pub max_keys: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct ListObjectsV2Output {
    pub contents: Vec<S3Object>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
    pub key_count: u32,
}

#[derive(Debug, Clone)]
pub struct PresignInput {
    pub bucket: String,
    pub key: String,
    pub method: SignMethod,
    pub expires_in: Duration,
}

/// S3 protocol client / S3协议客户端
#[async_trait]
pub trait S3Client: Send + Sync {
    async fn get_object(&self, input: ObjectRef) -> Result<GetObjectOutput, S3Error>;

    async fn head_object(&self, input: ObjectRef) -> Result<HeadObjectOutput, S3Error>;

    async fn put_object(&self, input: PutObjectInput) -> Result<(), S3Error>;

    async fn copy_object(&self, input: CopyObjectInput) -> Result<(), S3Error>;

    async fn delete_object(&self, input: ObjectRef) -> Result<(), S3Error>;

    async fn delete_objects(&self, input: DeleteObjectsInput)
        -> Result<DeleteObjectsOutput, S3Error>;

    async fn list_objects(&self, input: ListObjectsInput) -> Result<ListObjectsOutput, S3Error>;

    async fn list_objects_v2(
        &self,
        input: ListObjectsV2Input,
    ) -> Result<ListObjectsV2Output, S3Error>;

    /// Pre-signed URL; performs no request / 预签名URL
    async fn presign(&self, input: PresignInput) -> Result<String, S3Error>;
}
