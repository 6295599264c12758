//! XML bodies shared by the S3 and OSS wire protocols / S3与OSS共用的XML结构
//!
//! Both services answer listing, multi-delete and error requests with the
//! same element names, so one set of serde structs covers both drivers.

use serde::Deserialize;

/// `<ListBucketResult>` for v1 and v2 listings
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListBucketResult {
    #[serde(rename = "IsTruncated")]
    pub is_truncated: bool,
    #[serde(rename = "NextMarker")]
    pub next_marker: Option<String>,
    #[serde(rename = "NextContinuationToken")]
    pub next_continuation_token: Option<String>,
    #[serde(rename = "KeyCount")]
    pub key_count: Option<u32>,
    #[serde(rename = "Contents")]
    pub contents: Vec<ListEntry>,
    #[serde(rename = "CommonPrefixes")]
    pub common_prefixes: Vec<CommonPrefix>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListEntry {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "LastModified")]
    pub last_modified: Option<String>,
    #[serde(rename = "ETag")]
    pub etag: Option<String>,
    #[serde(rename = "Size")]
    pub size: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommonPrefix {
    #[serde(rename = "Prefix")]
    pub prefix: String,
}

/// `<DeleteResult>`; in quiet mode only failures are listed
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteResult {
    #[serde(rename = "Deleted")]
    pub deleted: Vec<DeletedEntry>,
    #[serde(rename = "Error")]
    pub errors: Vec<DeleteErrorEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeletedEntry {
    #[serde(rename = "Key")]
    pub key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteErrorEntry {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

/// `<Error>` response body / 错误响应
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "RequestId")]
    pub request_id: Option<String>,
}

impl ErrorBody {
    /// Parse an error body; empty or malformed bodies yield `None`
    pub fn parse(text: &str) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }
        quick_xml::de::from_str::<ErrorBody>(text)
            .ok()
            .filter(|e| !e.code.is_empty())
    }
}

/// `<Delete>` request body for multi-object delete / 批量删除请求体
pub fn delete_request_body(keys: &[String], quiet: bool) -> String {
    let mut body = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Delete>"#);
    body.push_str(if quiet {
        "<Quiet>true</Quiet>"
    } else {
        "<Quiet>false</Quiet>"
    });
    for key in keys {
        body.push_str("<Object><Key>");
        body.push_str(&quick_xml::escape::escape(key.as_str()));
        body.push_str("</Key></Object>");
    }
    body.push_str("</Delete>");
    body
}
