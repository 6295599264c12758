//! Error types / 错误类型
//!
//! Only the not-found condition is normalized (to `None`) by the adapters.
//! Backend errors are carried transparently so their diagnostics survive.
//! 只有"对象不存在"会被适配器转换为 `None`，其余后端错误原样透传

use thiserror::Error;

use crate::drivers::oss::OssError;
use crate::drivers::s3::S3Error;

/// Result alias for the crate / 统一结果类型
pub type Result<T> = std::result::Result<T, StorageError>;

/// Unified storage error / 统一存储错误
#[derive(Error, Debug)]
pub enum StorageError {
    /// Invalid construction options (fatal, never retried) / 配置错误
    #[error("invalid options: {0}")]
    Config(String),

    /// Caller broke an input contract, rejected before any request / 输入参数不合法
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// S3 backend error, unchanged / S3后端错误
    #[error(transparent)]
    S3(#[from] S3Error),

    /// OSS backend error, unchanged / OSS后端错误
    #[error(transparent)]
    Oss(#[from] OssError),

    /// Codec failure while compressing or decompressing / 压缩或解压失败
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
}

impl StorageError {
    /// Whether the backend reported a missing object / 是否为对象不存在
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::S3(e) => e.is_not_found(),
            StorageError::Oss(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Whether retrying the same request may succeed / 是否为可重试的瞬时错误
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::S3(e) => e.is_transient(),
            StorageError::Oss(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// HTTP statuses and service codes treated as transient by both backends
pub(crate) fn is_transient_status(status: u16, code: &str) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
        || matches!(
            code,
            "SlowDown" | "RequestTimeout" | "InternalError" | "ServiceUnavailable" | "Throttling"
        )
}
