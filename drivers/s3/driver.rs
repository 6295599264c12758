//! S3 adapter / S3适配器
//!
//! Maps the unified contract onto `S3Client` calls: typed not-found errors
//! become `None`, parsed metadata passes straight through, and v1/v2
//! listings keep their own cursors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::client::*;
use crate::error::{Result, StorageError};
use crate::models::{
    CopyOptions, GetObjectResult, HeadOptions, ListOptions, ListPage, ListPageV2, ListV2Options,
    MetaMap, ObjectDescriptor, ObjectHeaders, Payload, PutOptions, SignatureUrlOptions,
    DEFAULT_CONTENT_TYPE,
};
use crate::storage::base::AdapterBase;
use crate::storage::meta::{filter_meta, stringify_meta, StandardHeaders};
use crate::storage::ObjectStore;

pub struct S3Adapter {
    client: Arc<dyn S3Client>,
    base: AdapterBase,
}

impl S3Adapter {
    pub fn new(client: Arc<dyn S3Client>, base: AdapterBase) -> Self {
        Self { client, base }
    }
}

fn descriptor(object: S3Object) -> ObjectDescriptor {
    ObjectDescriptor {
        key: object.key,
        etag: object.e_tag,
        last_modified: object.last_modified,
        size: object.size,
    }
}

/// Treat a not-found reply as absence / 不存在转换为 None
fn found<T>(result: std::result::Result<T, S3Error>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ObjectStore for S3Adapter {
    fn name(&self) -> &str {
        "s3"
    }

    async fn get_as_buffer(
        &self,
        key: &str,
        meta_keys: &[&str],
    ) -> Result<Option<GetObjectResult<Bytes>>> {
        let bucket = self.base.bucket(key)?;
        tracing::debug!("S3 GetObject: bucket={}, key={}", bucket, key);
        let output = match found(self.client.get_object(ObjectRef::new(&bucket, key)).await)? {
            Some(o) => o,
            None => return Ok(None),
        };

        let content = self
            .base
            .decode(output.body, output.content_encoding.as_deref())?;
        Ok(Some(GetObjectResult {
            content,
            meta: filter_meta(&output.metadata, meta_keys),
            headers: ObjectHeaders {
                content_type: output.content_type,
                etag: output.e_tag,
                content_length: output.content_length,
            },
        }))
    }

    async fn put(&self, key: &str, data: Payload, options: PutOptions) -> Result<()> {
        let bucket = self.base.bucket(key)?;
        let encoded = self
            .base
            .encode(data.into_bytes(), options.headers.content_encoding)?;
        tracing::debug!(
            "S3 PutObject: bucket={}, key={}, size={}",
            bucket,
            key,
            encoded.body.len()
        );
        self.client
            .put_object(PutObjectInput {
                bucket,
                key: key.to_string(),
                body: encoded.body,
                content_type: Some(
                    options
                        .content_type
                        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
                ),
                content_encoding: encoded.content_encoding,
                content_disposition: options.headers.content_disposition,
                cache_control: options.headers.cache_control,
                metadata: stringify_meta(&options.meta),
            })
            .await?;
        Ok(())
    }

    async fn copy(&self, dest_key: &str, source_key: &str, options: CopyOptions) -> Result<()> {
        let directive = if options.meta.is_empty() {
            MetadataDirective::Copy
        } else {
            MetadataDirective::Replace
        };
        let source_bucket = self.base.bucket(source_key)?;
        let mut content_type = options.content_type;
        let mut content_encoding = options.headers.content_encoding;
        // REPLACE drops every stored header, the compression marker included
        if directive == MetadataDirective::Replace
            && (content_type.is_none() || content_encoding.is_none())
        {
            let source = ObjectRef::new(&source_bucket, source_key);
            if let Some(head) = found(self.client.head_object(source).await)? {
                content_type = content_type.or(head.content_type);
                content_encoding = content_encoding.or(head.content_encoding);
            }
        }
        let input = CopyObjectInput {
            bucket: self.base.bucket(dest_key)?,
            key: dest_key.to_string(),
            source_bucket,
            source_key: source_key.to_string(),
            metadata_directive: directive,
            metadata: stringify_meta(&options.meta),
            content_type,
            content_encoding,
            content_disposition: options.headers.content_disposition,
            cache_control: options.headers.cache_control,
        };
        tracing::debug!(
            "S3 CopyObject: {}/{} -> {}/{} ({})",
            input.source_bucket,
            source_key,
            input.bucket,
            dest_key,
            directive.as_str()
        );

        self.base
            .retry()
            .run("S3 CopyObject", || {
                let client = self.client.clone();
                let input = input.clone();
                async move { client.copy_object(input).await.map_err(StorageError::from) }
            })
            .await
    }

    async fn del(&self, key: &str) -> Result<()> {
        let bucket = self.base.bucket(key)?;
        tracing::debug!("S3 DeleteObject: bucket={}, key={}", bucket, key);
        found(self.client.delete_object(ObjectRef::new(&bucket, key)).await)?;
        Ok(())
    }

    async fn del_multi(&self, keys: &[String]) -> Result<Vec<String>> {
        let first = match keys.first() {
            Some(k) => k,
            None => return Ok(Vec::new()),
        };
        let bucket = self.base.bucket(first)?;
        tracing::debug!("S3 DeleteObjects: bucket={}, count={}", bucket, keys.len());
        let output = self
            .client
            .delete_objects(DeleteObjectsInput {
                bucket,
                keys: keys.to_vec(),
                quiet: true,
            })
            .await?;
        for e in &output.errors {
            tracing::warn!("S3 DeleteObjects failed for {}: {} {}", e.key, e.code, e.message);
        }
        Ok(output.deleted)
    }

    async fn head(&self, key: &str, options: HeadOptions) -> Result<Option<MetaMap>> {
        let bucket = self.base.bucket(key)?;
        tracing::debug!("S3 HeadObject: bucket={}, key={}", bucket, key);
        let output = match found(self.client.head_object(ObjectRef::new(&bucket, key)).await)? {
            Some(o) => o,
            None => return Ok(None),
        };

        let mut meta = output.metadata;
        if options.with_standard_headers {
            StandardHeaders {
                content_type: output.content_type,
                content_length: output.content_length,
                accept_ranges: output.accept_ranges,
                etag: output.e_tag,
                last_modified: output.last_modified,
            }
            .merge_into(&mut meta);
        }
        Ok(Some(meta))
    }

    async fn list_details(&self, key: &str, options: ListOptions) -> Result<ListPage> {
        let bucket = self.base.bucket(key)?;
        tracing::debug!(
            "S3 ListObjects: bucket={}, prefix={:?}, marker={:?}",
            bucket,
            options.prefix,
            options.marker
        );
        let output = self
            .client
            .list_objects(ListObjectsInput {
                bucket,
                prefix: options.prefix,
                delimiter: options.delimiter,
                marker: options.marker,
                max_keys: options.max_keys,
            })
            .await?;

        // Without a delimiter S3 omits NextMarker; the last key continues the listing
        let next_marker = match output.next_marker.filter(|m| !m.is_empty()) {
            Some(m) => Some(m),
            None if output.is_truncated => output
                .contents
                .last()
                .map(|o| o.key.clone())
                .or_else(|| output.common_prefixes.last().cloned()),
            None => None,
        };
        Ok(ListPage::new(
            output.contents.into_iter().map(descriptor).collect(),
            output.common_prefixes,
            output.is_truncated,
            next_marker,
        ))
    }

    async fn list_details_v2(&self, key: &str, options: ListV2Options) -> Result<ListPageV2> {
        let bucket = self.base.bucket(key)?;
        tracing::debug!(
            "S3 ListObjectsV2: bucket={}, prefix={:?}, token={:?}",
            bucket,
            options.prefix,
            options.continuation_token
        );
        let output = self
            .client
            .list_objects_v2(ListObjectsV2Input {
                bucket,
                prefix: options.prefix,
                delimiter: options.delimiter,
                continuation_token: options.continuation_token,
                max_keys: options.max_keys,
            })
            .await?;
        Ok(ListPageV2::new(
            output.contents.into_iter().map(descriptor).collect(),
            output.common_prefixes,
            output.is_truncated,
            output.next_continuation_token,
        ))
    }

    async fn signature_url(
        &self,
        key: &str,
        options: SignatureUrlOptions,
    ) -> Result<Option<String>> {
        let bucket = self.base.bucket(key)?;
        let input = PresignInput {
            bucket,
            key: key.to_string(),
            method: options.method,
            expires_in: Duration::from_secs(options.expires),
        };
        match self.client.presign(input).await {
            Ok(url) => Ok(Some(url)),
            Err(e) => {
                tracing::warn!("S3 presign failed for {}: {}", key, e);
                Ok(None)
            }
        }
    }
}
