//! Transparent payload compression / 透明压缩
//!
//! The codec name doubles as the `Content-Encoding` marker stored with the
//! object. Readers decide whether to decompress from that marker alone.

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use serde::{Deserialize, Serialize};

/// Supported codecs / 支持的压缩算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Gzip,
    /// zlib stream, the `deflate` content-coding / zlib格式
    Deflate,
}

impl Codec {
    /// Content-Encoding marker / 编码标记
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Deflate => "deflate",
        }
    }

    /// Map a stored Content-Encoding marker back to a codec
    pub fn from_marker(marker: &str) -> Option<Codec> {
        match marker.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Some(Codec::Gzip),
            "deflate" => Some(Codec::Deflate),
            _ => None,
        }
    }

    pub fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Codec::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Codec::Deflate => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
        }
    }

    pub fn decompress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut output = Vec::new();
        match self {
            Codec::Gzip => {
                GzDecoder::new(data).read_to_end(&mut output)?;
            }
            Codec::Deflate => {
                ZlibDecoder::new(data).read_to_end(&mut output)?;
            }
        }
        Ok(output)
    }
}

/// Write-side compression policy: one codec plus an optional size threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compressor {
    codec: Codec,
    threshold: Option<usize>,
}

impl Compressor {
    pub fn new(codec: Codec, threshold: Option<usize>) -> Self {
        Self { codec, threshold }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Whether a payload of `len` bytes gets compressed / 是否需要压缩
    pub fn applies_to(&self, len: usize) -> bool {
        self.threshold.map_or(true, |t| len >= t)
    }
}
