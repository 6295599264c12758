//! OSS adapter / OSS适配器

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::client::*;
use crate::error::{Result, StorageError};
use crate::models::{
    CopyOptions, GetObjectResult, HeadOptions, HttpHeaders, ListOptions, ListPage, ListPageV2,
    ListV2Options, MetaMap, ObjectDescriptor, ObjectHeaders, Payload, PutOptions,
    SignatureUrlOptions, DEFAULT_CONTENT_TYPE,
};
use crate::storage::base::AdapterBase;
use crate::storage::meta::{filter_meta, stringify_meta, StandardHeaders};
use crate::storage::ObjectStore;
use crate::utils::{parse_http_date, parse_iso_date};

pub struct OssAdapter {
    client: Arc<dyn OssClient>,
    base: AdapterBase,
}

impl OssAdapter {
    pub fn new(client: Arc<dyn OssClient>, base: AdapterBase) -> Self {
        Self { client, base }
    }
}

/// User metadata from raw headers, without the `x-oss-meta-` prefix
fn user_meta(headers: &HashMap<String, String>) -> MetaMap {
    headers
        .iter()
        .filter_map(|(k, v)| {
            k.to_lowercase()
                .strip_prefix(OSS_META_PREFIX)
                .map(|name| (name.to_string(), v.clone()))
        })
        .collect()
}

fn transport_headers(headers: &HttpHeaders, content_encoding: Option<String>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if let Some(ref v) = headers.cache_control {
        out.insert("Cache-Control".to_string(), v.clone());
    }
    if let Some(ref v) = headers.content_disposition {
        out.insert("Content-Disposition".to_string(), v.clone());
    }
    if let Some(v) = content_encoding {
        out.insert("Content-Encoding".to_string(), v);
    }
    out
}

fn descriptor(object: OssObjectMeta) -> ObjectDescriptor {
    ObjectDescriptor {
        last_modified: parse_iso_date(&object.last_modified),
        key: object.name,
        etag: object.etag,
        size: object.size,
    }
}

fn found<T>(result: std::result::Result<T, OssError>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ObjectStore for OssAdapter {
    fn name(&self) -> &str {
        "oss"
    }

    async fn get_as_buffer(
        &self,
        key: &str,
        meta_keys: &[&str],
    ) -> Result<Option<GetObjectResult<Bytes>>> {
        let bucket = self.base.bucket(key)?;
        tracing::debug!("OSS GetObject: bucket={}, key={}", bucket, key);
        let result = match found(self.client.get(&bucket, key).await)? {
            Some(r) => r,
            None => return Ok(None),
        };

        let headers = &result.res.headers;
        let content = self.base.decode(
            result.content.clone(),
            headers.get("content-encoding").map(String::as_str),
        )?;
        Ok(Some(GetObjectResult {
            content,
            meta: filter_meta(&user_meta(headers), meta_keys),
            headers: ObjectHeaders {
                content_type: headers.get("content-type").cloned(),
                etag: headers.get("etag").cloned(),
                content_length: headers.get("content-length").and_then(|v| v.parse().ok()),
            },
        }))
    }

    async fn put(&self, key: &str, data: Payload, options: PutOptions) -> Result<()> {
        let bucket = self.base.bucket(key)?;
        let encoded = self
            .base
            .encode(data.into_bytes(), options.headers.content_encoding.clone())?;
        tracing::debug!(
            "OSS PutObject: bucket={}, key={}, size={}",
            bucket,
            key,
            encoded.body.len()
        );
        let put_options = OssPutOptions {
            mime: Some(
                options
                    .content_type
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            ),
            meta: stringify_meta(&options.meta),
            headers: transport_headers(&options.headers, encoded.content_encoding),
        };
        self.client.put(&bucket, key, encoded.body, put_options).await?;
        Ok(())
    }

    async fn copy(&self, dest_key: &str, source_key: &str, options: CopyOptions) -> Result<()> {
        let bucket = self.base.bucket(dest_key)?;
        let source_bucket = self.base.bucket(source_key)?;
        let replace = !options.meta.is_empty();
        let mut mime = options.content_type.clone();
        let mut content_encoding = options.headers.content_encoding.clone();
        // REPLACE drops every stored header, the compression marker included
        if replace && (mime.is_none() || content_encoding.is_none()) {
            if let Some(res) = found(self.client.head(&source_bucket, source_key).await)? {
                mime = mime.or_else(|| res.headers.get("content-type").cloned());
                content_encoding =
                    content_encoding.or_else(|| res.headers.get("content-encoding").cloned());
            }
        }
        let copy_options = OssCopyOptions {
            meta: replace.then(|| stringify_meta(&options.meta)),
            mime,
            headers: transport_headers(&options.headers, content_encoding),
        };
        tracing::debug!(
            "OSS CopyObject: {}/{} -> {}/{} ({})",
            source_bucket,
            source_key,
            bucket,
            dest_key,
            if copy_options.meta.is_some() { "REPLACE" } else { "COPY" }
        );

        self.base
            .retry()
            .run("OSS CopyObject", || {
                let client = self.client.clone();
                let options = copy_options.clone();
                let (bucket, source_bucket) = (bucket.clone(), source_bucket.clone());
                async move {
                    client
                        .copy(&bucket, dest_key, &source_bucket, source_key, options)
                        .await
                        .map(|_| ())
                        .map_err(StorageError::from)
                }
            })
            .await
    }

    async fn del(&self, key: &str) -> Result<()> {
        let bucket = self.base.bucket(key)?;
        tracing::debug!("OSS DeleteObject: bucket={}, key={}", bucket, key);
        found(self.client.delete(&bucket, key).await)?;
        Ok(())
    }

    async fn del_multi(&self, keys: &[String]) -> Result<Vec<String>> {
        let first = match keys.first() {
            Some(k) => k,
            None => return Ok(Vec::new()),
        };
        let bucket = self.base.bucket(first)?;
        tracing::debug!("OSS DeleteMultipleObjects: bucket={}, count={}", bucket, keys.len());
        let result = self.client.delete_multi(&bucket, keys, true).await?;
        Ok(result.deleted)
    }

    async fn head(&self, key: &str, options: HeadOptions) -> Result<Option<MetaMap>> {
        let bucket = self.base.bucket(key)?;
        tracing::debug!("OSS HeadObject: bucket={}, key={}", bucket, key);
        let res = match found(self.client.head(&bucket, key).await)? {
            Some(r) => r,
            None => return Ok(None),
        };

        let mut meta = user_meta(&res.headers);
        if options.with_standard_headers {
            let h = &res.headers;
            StandardHeaders {
                content_type: h.get("content-type").cloned(),
                content_length: h.get("content-length").and_then(|v| v.parse().ok()),
                accept_ranges: h.get("accept-ranges").cloned(),
                etag: h.get("etag").cloned(),
                last_modified: h.get("last-modified").and_then(|v| parse_http_date(v)),
            }
            .merge_into(&mut meta);
        }
        Ok(Some(meta))
    }

    async fn list_details(&self, key: &str, options: ListOptions) -> Result<ListPage> {
        let bucket = self.base.bucket(key)?;
        tracing::debug!(
            "OSS ListObjects: bucket={}, prefix={:?}, marker={:?}",
            bucket,
            options.prefix,
            options.marker
        );
        let result = self
            .client
            .list(
                &bucket,
                OssListQuery {
                    prefix: options.prefix,
                    delimiter: options.delimiter,
                    marker: options.marker,
                    max_keys: options.max_keys,
                },
            )
            .await?;
        Ok(ListPage::new(
            result.objects.into_iter().map(descriptor).collect(),
            result.prefixes,
            result.is_truncated,
            result.next_marker,
        ))
    }

    async fn list_details_v2(&self, key: &str, options: ListV2Options) -> Result<ListPageV2> {
        let bucket = self.base.bucket(key)?;
        tracing::debug!(
            "OSS ListObjectsV2: bucket={}, prefix={:?}, token={:?}",
            bucket,
            options.prefix,
            options.continuation_token
        );
        let result = self
            .client
            .list_v2(
                &bucket,
                OssListV2Query {
                    prefix: options.prefix,
                    delimiter: options.delimiter,
                    continuation_token: options.continuation_token,
                    max_keys: options.max_keys,
                },
            )
            .await?;
        Ok(ListPageV2::new(
            result.objects.into_iter().map(descriptor).collect(),
            result.prefixes,
            result.is_truncated,
            result.next_continuation_token,
        ))
    }

    async fn signature_url(
        &self,
        key: &str,
        options: SignatureUrlOptions,
    ) -> Result<Option<String>> {
        let bucket = self.base.bucket(key)?;
        let sign_options = OssSignatureOptions {
            expires: options.expires,
            method: options.method,
        };
        match self.client.signature_url(&bucket, key, sign_options) {
            Ok(url) => Ok(Some(url)),
            Err(e) => {
                tracing::warn!("OSS signatureUrl failed for {}: {}", key, e);
                Ok(None)
            }
        }
    }
}
