//! Shared helpers for both object-storage drivers / 驱动共用工具函数

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};

/// URI-encode per RFC 3986, keeping unreserved characters / URI编码
/// `encode_slash = false` keeps `/` so object keys stay path-shaped.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    if encode_slash {
        return urlencoding::encode(input).into_owned();
    }
    input
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether the key has a `.` or `..` segment / 是否包含点路径段
/// URL parsing collapses these, `%2E` forms included, so such keys cannot be
/// addressed in a request path.
pub fn has_dot_segment(key: &str) -> bool {
    key.split('/').any(|segment| segment == "." || segment == "..")
}

/// RFC 1123 date used by the `Date` header / GMT日期字符串
pub fn gmt_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse a `Last-Modified` header value / 解析HTTP日期
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Parse an ISO-8601 timestamp from a listing body / 解析列举结果中的时间
pub fn parse_iso_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Base64 MD5 digest for the `Content-MD5` header
pub fn content_md5(body: &[u8]) -> String {
    BASE64.encode(md5::compute(body).0)
}

/// Flatten response headers to lowercase name -> value / 响应头转为Map
pub fn header_map(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}

/// Host plus explicit port, as sent in the `Host` header
pub fn host_with_port(url: &url::Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
