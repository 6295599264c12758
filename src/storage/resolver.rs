//! Bucket resolution / 存储桶解析
//!
//! Pure and deterministic: the same key always maps to the same bucket.
//! The object key itself is passed to the backend unchanged.

use regex::Regex;

use crate::error::{Result, StorageError};

#[derive(Debug, Clone)]
pub enum BucketResolver {
    /// Every key lives in one bucket / 固定存储桶
    Fixed(String),
    /// Bucket is `bucket_prefix` + segment before `separator` / 键前缀
    KeyPrefix {
        separator: String,
        bucket_prefix: String,
        fallback: Option<String>,
    },
    /// Bucket is the first capture group of `regex` / 正则匹配
    Pattern {
        regex: Regex,
        fallback: Option<String>,
    },
}

impl BucketResolver {
    /// Resolve the bucket name for a key / 解析键对应的存储桶
    pub fn resolve(&self, key: &str) -> Result<String> {
        match self {
            BucketResolver::Fixed(bucket) => Ok(bucket.clone()),
            BucketResolver::KeyPrefix {
                separator,
                bucket_prefix,
                fallback,
            } => {
                let key = key.trim_start_matches('/');
                match key.split_once(separator.as_str()) {
                    Some((head, _)) if !head.is_empty() => Ok(format!("{}{}", bucket_prefix, head)),
                    Some(_) => Self::fallback(key, fallback),
                    None => match fallback {
                        Some(bucket) => Ok(bucket.clone()),
                        None if !key.is_empty() => Ok(format!("{}{}", bucket_prefix, key)),
                        None => Self::fallback(key, fallback),
                    },
                }
            }
            BucketResolver::Pattern { regex, fallback } => {
                let captured = regex
                    .captures(key)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str())
                    .filter(|s| !s.is_empty());
                match captured {
                    Some(bucket) => Ok(bucket.to_string()),
                    None => Self::fallback(key, fallback),
                }
            }
        }
    }

    fn fallback(key: &str, fallback: &Option<String>) -> Result<String> {
        fallback.clone().ok_or_else(|| {
            StorageError::InvalidInput(format!("cannot resolve a bucket for key '{}'", key))
        })
    }
}
