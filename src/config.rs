//! Construction options and validation / 构造选项与校验
//!
//! Options deserialize from a flat camelCase JSON bag. `validate()` checks
//! every required combination and produces typed settings before any client
//! handle exists, so a half-built adapter is never observable.

use std::str::FromStr;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, StorageError};
use crate::storage::base::AdapterBase;
use crate::storage::compression::{Codec, Compressor};
use crate::storage::resolver::BucketResolver;
use crate::storage::retry::RetryPolicy;

/// Backend discriminator / 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Alibaba Cloud OSS family / 阿里云OSS
    Oss,
    /// AWS S3 family, including MinIO / S3兼容存储
    S3,
}

impl FromStr for BackendType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "oss" => Ok(BackendType::Oss),
            "aws" | "s3" => Ok(BackendType::S3),
            other => Err(StorageError::Config(format!(
                "unknown backendType '{}', expected 'oss', 'aws' or 's3'",
                other
            ))),
        }
    }
}

/// Bucket resolution settings / 存储桶解析策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "camelCase")]
pub enum BucketOptions {
    /// One bucket for every key / 固定存储桶
    Fixed { bucket: String },
    /// Segment of the key before `separator` / 取键的首段作为存储桶
    #[serde(rename_all = "camelCase")]
    KeyPrefix {
        #[serde(default = "default_separator")]
        separator: String,
        #[serde(default)]
        bucket_prefix: String,
        #[serde(default)]
        fallback: Option<String>,
    },
    /// First capture group of `pattern` / 正则首个捕获组
    #[serde(rename_all = "camelCase")]
    Pattern {
        pattern: String,
        #[serde(default)]
        fallback: Option<String>,
    },
}

impl Default for BucketOptions {
    fn default() -> Self {
        BucketOptions::Fixed {
            bucket: String::new(),
        }
    }
}

fn default_separator() -> String {
    "/".to_string()
}

/// Transparent compression settings / 透明压缩配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionOptions {
    pub codec: Codec,
    /// Minimum payload size in bytes; unset compresses every payload / 最小压缩字节数
    #[serde(default)]
    pub threshold: Option<usize>,
}

/// Copy retry tuning / 复制重试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryOptions {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound of a single wait / 单次等待上限
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    1000
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Construction options / 构造选项
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageOptions {
    /// `oss`, `aws` or `s3`
    #[serde(default)]
    pub backend_type: Option<String>,
    #[serde(default, rename = "accessKeyID", alias = "accessKeyId")]
    pub access_key_id: String,
    #[serde(default)]
    pub access_key_secret: String,
    /// STS session token / 临时凭证令牌
    #[serde(default)]
    pub security_token: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Path-style (MinIO) addressing, requires `endpoint` / 路径风格
    #[serde(default, alias = "minio")]
    pub path_style_addressing: bool,
    #[serde(default)]
    pub bucket: BucketOptions,
    #[serde(default)]
    pub compression: Option<CompressionOptions>,
    #[serde(default)]
    pub retry: RetryOptions,
    /// HTTP client timeout in seconds / 请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            backend_type: None,
            access_key_id: String::new(),
            access_key_secret: String::new(),
            security_token: None,
            endpoint: None,
            region: None,
            path_style_addressing: false,
            bucket: BucketOptions::default(),
            compression: None,
            retry: RetryOptions::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Access credentials / 访问凭证
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub security_token: Option<String>,
}

/// How requests reach a bucket / 访问地址风格
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addressing {
    /// `endpoint/bucket/key`
    PathStyle { endpoint: Url, region: Option<String> },
    /// `bucket.host/key`; host from `endpoint` or derived from `region`
    VirtualHosted { region: String, endpoint: Option<Url> },
}

impl Addressing {
    pub fn region(&self) -> Option<&str> {
        match self {
            Addressing::PathStyle { region, .. } => region.as_deref(),
            Addressing::VirtualHosted { region, .. } => Some(region),
        }
    }
}

/// Validated settings for building a vendor client / 客户端配置
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub credentials: Credentials,
    pub addressing: Addressing,
    pub timeout: Duration,
}

/// Per-backend validated settings / 按后端区分的配置
#[derive(Debug, Clone)]
pub enum BackendConfig {
    S3(ClientSettings),
    Oss(ClientSettings),
}

/// Everything needed to build one adapter / 构建适配器所需的全部配置
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub backend: BackendConfig,
    pub base: AdapterBase,
}

impl StorageOptions {
    /// Validate the option bag / 校验配置
    pub fn validate(&self) -> Result<ValidatedConfig> {
        let backend_type: BackendType = self
            .backend_type
            .as_deref()
            .ok_or_else(|| StorageError::Config("backendType is required".to_string()))?
            .parse()?;

        if self.access_key_id.trim().is_empty() || self.access_key_secret.trim().is_empty() {
            return Err(StorageError::Config(
                "accessKeyID and accessKeySecret are required".to_string(),
            ));
        }

        let settings = ClientSettings {
            credentials: Credentials {
                access_key_id: self.access_key_id.clone(),
                access_key_secret: self.access_key_secret.clone(),
                security_token: self.security_token.clone().filter(|t| !t.is_empty()),
            },
            addressing: self.addressing()?,
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
        };

        let backend = match backend_type {
            BackendType::S3 => BackendConfig::S3(settings),
            BackendType::Oss => BackendConfig::Oss(settings),
        };

        Ok(ValidatedConfig {
            backend,
            base: AdapterBase::new(self.resolver()?, self.compressor(), self.retry_policy()?),
        })
    }

    fn addressing(&self) -> Result<Addressing> {
        let region = self
            .region
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let endpoint = match self.endpoint.as_deref().map(str::trim) {
            Some(e) if !e.is_empty() => Some(parse_endpoint(e)?),
            _ => None,
        };

        if self.path_style_addressing {
            let endpoint = endpoint.ok_or_else(|| {
                StorageError::Config("endpoint is required for path-style addressing".to_string())
            })?;
            Ok(Addressing::PathStyle { endpoint, region })
        } else {
            let region = region.ok_or_else(|| {
                StorageError::Config("region is required for standard addressing".to_string())
            })?;
            Ok(Addressing::VirtualHosted { region, endpoint })
        }
    }

    fn resolver(&self) -> Result<BucketResolver> {
        match &self.bucket {
            BucketOptions::Fixed { bucket } => {
                if bucket.trim().is_empty() {
                    return Err(StorageError::Config("bucket is required".to_string()));
                }
                Ok(BucketResolver::Fixed(bucket.trim().to_string()))
            }
            BucketOptions::KeyPrefix {
                separator,
                bucket_prefix,
                fallback,
            } => {
                if separator.is_empty() {
                    return Err(StorageError::Config(
                        "bucket separator must not be empty".to_string(),
                    ));
                }
                Ok(BucketResolver::KeyPrefix {
                    separator: separator.clone(),
                    bucket_prefix: bucket_prefix.clone(),
                    fallback: fallback.clone().filter(|f| !f.is_empty()),
                })
            }
            BucketOptions::Pattern { pattern, fallback } => {
                let regex = Regex::new(pattern).map_err(|e| {
                    StorageError::Config(format!("invalid bucket pattern '{}': {}", pattern, e))
                })?;
                if regex.captures_len() < 2 {
                    return Err(StorageError::Config(format!(
                        "bucket pattern '{}' needs a capture group",
                        pattern
                    )));
                }
                Ok(BucketResolver::Pattern {
                    regex,
                    fallback: fallback.clone().filter(|f| !f.is_empty()),
                })
            }
        }
    }

    fn compressor(&self) -> Option<Compressor> {
        self.compression
            .as_ref()
            .map(|c| Compressor::new(c.codec, c.threshold))
    }

    fn retry_policy(&self) -> Result<RetryPolicy> {
        if self.retry.max_attempts == 0 {
            return Err(StorageError::Config(
                "retry.maxAttempts must be at least 1".to_string(),
            ));
        }
        Ok(RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms.max(self.retry.base_delay_ms)),
        ))
    }
}

/// Accept `host:port` as well as full URLs / 支持省略协议的端点
fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let full = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    };
    let url = Url::parse(&full)
        .map_err(|e| StorageError::Config(format!("invalid endpoint '{}': {}", endpoint, e)))?;
    if url.host_str().is_none() {
        return Err(StorageError::Config(format!(
            "endpoint '{}' has no host",
            endpoint
        )));
    }
    Ok(url)
}
