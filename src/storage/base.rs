//! Shared adapter base / 适配器公共能力
//!
//! Both adapters compose one `AdapterBase` for bucket resolution,
//! transparent compression and the copy retry policy.

use bytes::Bytes;

use super::compression::{Codec, Compressor};
use super::resolver::BucketResolver;
use super::retry::RetryPolicy;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct AdapterBase {
    resolver: BucketResolver,
    compressor: Option<Compressor>,
    retry: RetryPolicy,
}

/// Payload ready to send plus the encoding marker to store with it
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    pub body: Bytes,
    pub content_encoding: Option<String>,
}

impl AdapterBase {
    pub fn new(resolver: BucketResolver, compressor: Option<Compressor>, retry: RetryPolicy) -> Self {
        Self {
            resolver,
            compressor,
            retry,
        }
    }

    /// Bucket for a key / 键所在的存储桶
    pub fn bucket(&self, key: &str) -> Result<String> {
        self.resolver.resolve(key)
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Compress on write when configured and large enough; compression
    /// overrides any caller-supplied content-encoding / 写入时按需压缩
    pub fn encode(&self, body: Bytes, content_encoding: Option<String>) -> Result<EncodedPayload> {
        match self.compressor {
            Some(c) if c.applies_to(body.len()) => {
                let codec = c.codec();
                if let Some(ref requested) = content_encoding {
                    if !requested.eq_ignore_ascii_case(codec.name()) {
                        tracing::debug!(
                            "content-encoding '{}' overridden by {} compression",
                            requested,
                            codec.name()
                        );
                    }
                }
                let compressed = codec.compress(&body)?;
                tracing::debug!(
                    "compressed payload {} -> {} bytes ({})",
                    body.len(),
                    compressed.len(),
                    codec.name()
                );
                Ok(EncodedPayload {
                    body: Bytes::from(compressed),
                    content_encoding: Some(codec.name().to_string()),
                })
            }
            _ => Ok(EncodedPayload {
                body,
                content_encoding,
            }),
        }
    }

    /// Reverse compression on read, driven only by the stored marker / 读取时按标记解压
    pub fn decode(&self, body: Bytes, content_encoding: Option<&str>) -> Result<Bytes> {
        match content_encoding.and_then(Codec::from_marker) {
            Some(codec) => Ok(Bytes::from(codec.decompress(&body)?)),
            None => Ok(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(compressor: Option<Compressor>) -> AdapterBase {
        AdapterBase::new(
            BucketResolver::Fixed("b".to_string()),
            compressor,
            RetryPolicy::default(),
        )
    }

    #[test]
    fn test_no_codec_passes_through() {
        let b = base(None);
        let out = b
            .encode(Bytes::from_static(b"hello"), Some("identity".to_string()))
            .unwrap();
        assert_eq!(out.body, Bytes::from_static(b"hello"));
        assert_eq!(out.content_encoding.as_deref(), Some("identity"));
    }

    #[test]
    fn test_compression_overrides_encoding() {
        let b = base(Some(Compressor::new(Codec::Gzip, Some(4))));
        let out = b
            .encode(Bytes::from_static(b"hello world"), Some("br".to_string()))
            .unwrap();
        assert_eq!(out.content_encoding.as_deref(), Some("gzip"));
        let back = b.decode(out.body, out.content_encoding.as_deref()).unwrap();
        assert_eq!(back, Bytes::from_static(b"hello world"));
    }

    #[test]
    fn test_below_threshold_not_compressed() {
        let b = base(Some(Compressor::new(Codec::Gzip, Some(100))));
        let out = b.encode(Bytes::from_static(b"tiny"), None).unwrap();
        assert_eq!(out.body, Bytes::from_static(b"tiny"));
        assert!(out.content_encoding.is_none());
    }

    #[test]
    fn test_decode_branches_on_marker_only() {
        // reader without a codec still honours a stored marker
        let writer = base(Some(Compressor::new(Codec::Deflate, None)));
        let reader = base(None);
        let out = writer.encode(Bytes::from_static(b"x"), None).unwrap();
        let back = reader.decode(out.body, out.content_encoding.as_deref()).unwrap();
        assert_eq!(back, Bytes::from_static(b"x"));

        let raw = reader.decode(Bytes::from_static(b"plain"), None).unwrap();
        assert_eq!(raw, Bytes::from_static(b"plain"));
    }
}
