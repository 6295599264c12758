//! Metadata map normalization / 元数据规范化

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::MetaMap;

/// Coerce caller metadata values to strings / 元数据值统一转为字符串
pub fn stringify_meta(meta: &HashMap<String, Value>) -> MetaMap {
    meta.iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

/// Keep only the requested keys, matched case-insensitively since HTTP
/// transports lowercase metadata names. Results use the caller's spelling.
pub fn filter_meta(meta: &MetaMap, keys: &[&str]) -> MetaMap {
    let lowered: HashMap<String, &String> = meta
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect();
    keys.iter()
        .filter_map(|key| {
            meta.get(*key)
                .or_else(|| lowered.get(&key.to_lowercase()).copied())
                .map(|v| (key.to_string(), v.clone()))
        })
        .collect()
}

/// Standard transport headers merged into `head` results on request
#[derive(Debug, Clone, Default)]
pub struct StandardHeaders {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub accept_ranges: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl StandardHeaders {
    /// Merge under fixed external names; last-modified becomes epoch millis
    pub fn merge_into(self, meta: &mut MetaMap) {
        if let Some(v) = self.content_type {
            meta.insert("content-type".to_string(), v);
        }
        if let Some(v) = self.content_length {
            meta.insert("content-length".to_string(), v.to_string());
        }
        if let Some(v) = self.accept_ranges {
            meta.insert("accept-ranges".to_string(), v);
        }
        if let Some(v) = self.etag {
            meta.insert("etag".to_string(), v);
        }
        if let Some(v) = self.last_modified {
            meta.insert("last-modified".to_string(), v.timestamp_millis().to_string());
        }
    }
}
