//! Data model shared by the façade and both adapters / 数据模型
//!
//! The two listing cursor styles get their own page and option types so a
//! v1 marker can never be fed into a v2 request (or the reverse).

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User metadata map (string to string) / 用户元数据
pub type MetaMap = HashMap<String, String>;

/// Content type used when the caller gives none / 默认内容类型
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Default lifetime of a signed URL in seconds / 签名URL默认有效期（秒）
pub const DEFAULT_SIGNATURE_EXPIRES: u64 = 600;

/// Protocol-wide ceiling of keys in one multi-delete / 批量删除最大数量
pub const MAX_DELETE_KEYS: usize = 1000;

/// Object payload, text or raw bytes / 对象内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Bytes(Bytes),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(s) => s.len(),
            Payload::Bytes(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Payload::Text(s) => Bytes::from(s),
            Payload::Bytes(b) => b,
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(v))
    }
}

impl From<&[u8]> for Payload {
    fn from(v: &[u8]) -> Self {
        Payload::Bytes(Bytes::copy_from_slice(v))
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Bytes(b)
    }
}

/// Fixed header projection returned by get / get返回的固定响应头
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ObjectHeaders {
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub content_length: Option<u64>,
}

/// Result of get / getAsBuffer / 读取结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetObjectResult<T> {
    pub content: T,
    /// User metadata filtered to the requested keys / 按请求键过滤后的元数据
    pub meta: MetaMap,
    pub headers: ObjectHeaders,
}

/// Transport headers accepted by put and copy / 可设置的传输头
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpHeaders {
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
}

/// Put options / 上传选项
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PutOptions {
    /// Values of any JSON type, coerced to strings on send / 任意类型，发送时转为字符串
    pub meta: HashMap<String, Value>,
    pub content_type: Option<String>,
    pub headers: HttpHeaders,
}

impl PutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn content_type(mut self, val: &str) -> Self {
        self.content_type = Some(val.to_string());
        self
    }

    pub fn cache_control(mut self, val: &str) -> Self {
        self.headers.cache_control = Some(val.to_string());
        self
    }

    pub fn content_disposition(mut self, val: &str) -> Self {
        self.headers.content_disposition = Some(val.to_string());
        self
    }

    pub fn content_encoding(mut self, val: &str) -> Self {
        self.headers.content_encoding = Some(val.to_string());
        self
    }
}

/// Copy options / 复制选项
///
/// A non-empty `meta` replaces the destination metadata, an empty one copies
/// the source metadata unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CopyOptions {
    pub meta: HashMap<String, Value>,
    pub content_type: Option<String>,
    pub headers: HttpHeaders,
}

impl CopyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn content_type(mut self, val: &str) -> Self {
        self.content_type = Some(val.to_string());
        self
    }

    pub fn cache_control(mut self, val: &str) -> Self {
        self.headers.cache_control = Some(val.to_string());
        self
    }

    pub fn content_disposition(mut self, val: &str) -> Self {
        self.headers.content_disposition = Some(val.to_string());
        self
    }

    pub fn content_encoding(mut self, val: &str) -> Self {
        self.headers.content_encoding = Some(val.to_string());
        self
    }
}

/// Head options / head选项
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeadOptions {
    /// Merge content-type, content-length, accept-ranges, etag and last-modified
    pub with_standard_headers: bool,
}

/// v1 (marker based) listing options / v1列举选项
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub marker: Option<String>,
    pub max_keys: Option<u32>,
}

/// v2 (continuation token based) listing options / v2列举选项
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListV2Options {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
    pub max_keys: Option<u32>,
}

/// One listed object / 列举结果中的对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDescriptor {
    pub key: String,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
}

/// v1 listing page, cursor is `next_marker` / v1列举页
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    pub objects: Vec<ObjectDescriptor>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
}

impl ListPage {
    /// Build a page; a non-truncated page never carries a cursor
    pub fn new(
        objects: Vec<ObjectDescriptor>,
        common_prefixes: Vec<String>,
        is_truncated: bool,
        next_marker: Option<String>,
    ) -> Self {
        Self {
            objects,
            common_prefixes,
            is_truncated,
            next_marker: cursor(is_truncated, next_marker),
        }
    }
}

/// v2 listing page, cursor is `next_continuation_token` / v2列举页
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPageV2 {
    pub objects: Vec<ObjectDescriptor>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

impl ListPageV2 {
    /// Build a page; a non-truncated page never carries a cursor
    pub fn new(
        objects: Vec<ObjectDescriptor>,
        common_prefixes: Vec<String>,
        is_truncated: bool,
        next_continuation_token: Option<String>,
    ) -> Self {
        Self {
            objects,
            common_prefixes,
            is_truncated,
            next_continuation_token: cursor(is_truncated, next_continuation_token),
        }
    }
}

fn cursor(is_truncated: bool, value: Option<String>) -> Option<String> {
    if is_truncated {
        value.filter(|v| !v.is_empty())
    } else {
        None
    }
}

/// HTTP method a signed URL is valid for / 签名URL的请求方法
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignMethod {
    #[default]
    Get,
    Put,
}

impl SignMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignMethod::Get => "GET",
            SignMethod::Put => "PUT",
        }
    }
}

/// signatureUrl options / 签名URL选项
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignatureUrlOptions {
    /// Lifetime in seconds / 有效期（秒）
    pub expires: u64,
    pub method: SignMethod,
}

impl Default for SignatureUrlOptions {
    fn default() -> Self {
        Self {
            expires: DEFAULT_SIGNATURE_EXPIRES,
            method: SignMethod::Get,
        }
    }
}
