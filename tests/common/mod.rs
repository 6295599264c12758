//! In-memory S3 and OSS clients for driving the façade without a network
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use yaolist_objstore::drivers::oss::client::*;
use yaolist_objstore::drivers::s3::client::*;
use yaolist_objstore::{ObjectStorage, StorageOptions};

const MAX_EXPIRES: u64 = 604_800;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub metadata: HashMap<String, String>,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn new(
        body: Bytes,
        content_type: Option<String>,
        content_encoding: Option<String>,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            etag: format!("\"{:x}\"", md5::compute(&body)),
            body,
            content_type,
            content_encoding,
            // transports lowercase metadata names
            metadata: metadata
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
            last_modified: Utc::now(),
        }
    }
}

/// Bucket -> key -> object, shared by both fakes
#[derive(Default)]
pub struct Buckets {
    objects: Mutex<BTreeMap<String, BTreeMap<String, StoredObject>>>,
    /// Every call that would have reached the network
    pub requests: AtomicUsize,
    /// Errors handed out by the next copy calls
    pub copy_failures: Mutex<Vec<u16>>,
    /// Signing calls; these never touch an object
    pub presigns: AtomicUsize,
}

impl Buckets {
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn presign_count(&self) -> usize {
        self.presigns.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn signed(&self) {
        self.presigns.fetch_add(1, Ordering::SeqCst);
    }

    fn store(&self, bucket: &str, key: &str, object: StoredObject) {
        self.objects
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
    }

    fn remove(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .get_mut(bucket)
            .map(|b| b.remove(key).is_some())
            .unwrap_or(false)
    }

    fn next_copy_failure(&self) -> Option<u16> {
        self.copy_failures.lock().unwrap().pop()
    }

    /// Keys and common prefixes after `start`, plus whether more remain
    fn page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
        start: Option<&str>,
        max_keys: Option<u32>,
    ) -> (Vec<(String, StoredObject)>, Vec<String>, bool) {
        let objects = self.objects.lock().unwrap();
        let empty = BTreeMap::new();
        let all = objects.get(bucket).unwrap_or(&empty);
        let prefix = prefix.unwrap_or("");
        let limit = max_keys.unwrap_or(1000) as usize;

        let mut contents = Vec::new();
        let mut prefixes: Vec<String> = Vec::new();
        let mut truncated = false;
        for (key, object) in all.iter() {
            if !key.starts_with(prefix) || start.map_or(false, |s| key.as_str() <= s) {
                continue;
            }
            let rolled_up = delimiter.and_then(|d| {
                key[prefix.len()..]
                    .find(d)
                    .map(|i| key[..prefix.len() + i + d.len()].to_string())
            });
            if let Some(ref p) = rolled_up {
                if prefixes.last() == Some(p) {
                    continue;
                }
                if start.map_or(false, |s| p.as_str() <= s) {
                    continue;
                }
            }
            if contents.len() + prefixes.len() == limit {
                truncated = true;
                break;
            }
            match rolled_up {
                Some(p) => prefixes.push(p),
                None => contents.push((key.clone(), object.clone())),
            }
        }
        (contents, prefixes, truncated)
    }
}

// ---- S3 ----

#[derive(Default)]
pub struct MemoryS3 {
    pub buckets: Buckets,
}

fn s3_object(key: String, object: &StoredObject) -> S3Object {
    S3Object {
        key,
        e_tag: Some(object.etag.clone()),
        last_modified: Some(object.last_modified),
        size: object.body.len() as u64,
    }
}

fn last_cursor(contents: &[(String, StoredObject)], prefixes: &[String]) -> Option<String> {
    let key = contents.last().map(|(k, _)| k.clone());
    let prefix = prefixes.last().cloned();
    match (key, prefix) {
        (Some(k), Some(p)) => Some(if k > p { k } else { p }),
        (k, p) => k.or(p),
    }
}

#[async_trait]
impl S3Client for MemoryS3 {
    async fn get_object(&self, input: ObjectRef) -> Result<GetObjectOutput, S3Error> {
        self.buckets.hit();
        let object = self
            .buckets
            .object(&input.bucket, &input.key)
            .ok_or_else(|| S3Error::NoSuchKey(input.key.clone()))?;
        Ok(GetObjectOutput {
            content_length: Some(object.body.len() as u64),
            body: object.body,
            content_type: object.content_type,
            content_encoding: object.content_encoding,
            e_tag: Some(object.etag),
            metadata: object.metadata,
        })
    }

    async fn head_object(&self, input: ObjectRef) -> Result<HeadObjectOutput, S3Error> {
        self.buckets.hit();
        let object = self
            .buckets
            .object(&input.bucket, &input.key)
            .ok_or(S3Error::NotFound)?;
        Ok(HeadObjectOutput {
            content_type: object.content_type,
            content_length: Some(object.body.len() as u64),
            content_encoding: object.content_encoding,
            accept_ranges: Some("bytes".to_string()),
            e_tag: Some(object.etag),
            last_modified: Some(object.last_modified),
            metadata: object.metadata,
        })
    }

    async fn put_object(&self, input: PutObjectInput) -> Result<(), S3Error> {
        self.buckets.hit();
        let object = StoredObject::new(
            input.body,
            input.content_type,
            input.content_encoding,
            input.metadata,
        );
        self.buckets.store(&input.bucket, &input.key, object);
        Ok(())
    }

    async fn copy_object(&self, input: CopyObjectInput) -> Result<(), S3Error> {
        self.buckets.hit();
        if let Some(status) = self.buckets.next_copy_failure() {
            return Err(S3Error::Service {
                status,
                code: if status == 503 { "SlowDown" } else { "AccessDenied" }.to_string(),
                message: "injected".to_string(),
                request_id: None,
            });
        }
        let source = self
            .buckets
            .object(&input.source_bucket, &input.source_key)
            .ok_or_else(|| S3Error::NoSuchKey(input.source_key.clone()))?;
        // REPLACE keeps only what the request carried
        let object = match input.metadata_directive {
            MetadataDirective::Copy => source,
            MetadataDirective::Replace => StoredObject::new(
                source.body,
                input
                    .content_type
                    .or_else(|| Some("binary/octet-stream".to_string())),
                input.content_encoding,
                input.metadata,
            ),
        };
        self.buckets.store(&input.bucket, &input.key, object);
        Ok(())
    }

    async fn delete_object(&self, input: ObjectRef) -> Result<(), S3Error> {
        self.buckets.hit();
        self.buckets.remove(&input.bucket, &input.key);
        Ok(())
    }

    async fn delete_objects(
        &self,
        input: DeleteObjectsInput,
    ) -> Result<DeleteObjectsOutput, S3Error> {
        self.buckets.hit();
        let mut deleted = Vec::new();
        for key in &input.keys {
            self.buckets.remove(&input.bucket, key);
            deleted.push(key.clone());
        }
        // quiet mode reports failures only
        Ok(DeleteObjectsOutput {
            deleted: if input.quiet { Vec::new() } else { deleted },
            errors: Vec::new(),
        })
    }

    async fn list_objects(&self, input: ListObjectsInput) -> Result<ListObjectsOutput, S3Error> {
        self.buckets.hit();
        let (contents, prefixes, truncated) = self.buckets.page(
            &input.bucket,
            input.prefix.as_deref(),
            input.delimiter.as_deref(),
            input.marker.as_deref(),
            input.max_keys,
        );
        // like S3, NextMarker only comes back when a delimiter was sent
        let next_marker = if truncated && input.delimiter.is_some() {
            last_cursor(&contents, &prefixes)
        } else {
            None
        };
        Ok(ListObjectsOutput {
            contents: contents
                .iter()
                .map(|(k, o)| s3_object(k.clone(), o))
                .collect(),
            common_prefixes: prefixes,
            is_truncated: truncated,
            next_marker,
        })
    }

    async fn list_objects_v2(
        &self,
        input: ListObjectsV2Input,
    ) -> Result<ListObjectsV2Output, S3Error> {
        self.buckets.hit();
        let start = input
            .continuation_token
            .as_deref()
            .and_then(|t| t.strip_prefix("token:"));
        let (contents, prefixes, truncated) = self.buckets.page(
            &input.bucket,
            input.prefix.as_deref(),
            input.delimiter.as_deref(),
            start,
            input.max_keys,
        );
        let next = if truncated {
            last_cursor(&contents, &prefixes).map(|k| format!("token:{}", k))
        } else {
            None
        };
        Ok(ListObjectsV2Output {
            key_count: (contents.len() + prefixes.len()) as u32,
            contents: contents
                .iter()
                .map(|(k, o)| s3_object(k.clone(), o))
                .collect(),
            common_prefixes: prefixes,
            is_truncated: truncated,
            next_continuation_token: next,
        })
    }

    async fn presign(&self, input: PresignInput) -> Result<String, S3Error> {
        self.buckets.signed();
        let expires = input.expires_in.as_secs();
        if expires == 0 || expires > MAX_EXPIRES {
            return Err(S3Error::InvalidRequest("bad expiry".to_string()));
        }
        Ok(format!(
            "https://{}.s3.example.com/{}?X-Amz-Expires={}&method={}",
            input.bucket,
            input.key,
            expires,
            input.method.as_str()
        ))
    }
}

// ---- OSS ----

#[derive(Default)]
pub struct MemoryOss {
    pub buckets: Buckets,
}

fn oss_headers(object: &StoredObject) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("etag".to_string(), object.etag.clone());
    headers.insert("content-length".to_string(), object.body.len().to_string());
    headers.insert("accept-ranges".to_string(), "bytes".to_string());
    headers.insert(
        "last-modified".to_string(),
        object
            .last_modified
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string(),
    );
    headers.insert("x-oss-request-id".to_string(), "5C3D9175B6FC201293AD4890".to_string());
    if let Some(ref v) = object.content_type {
        headers.insert("content-type".to_string(), v.clone());
    }
    if let Some(ref v) = object.content_encoding {
        headers.insert("content-encoding".to_string(), v.clone());
    }
    for (k, v) in &object.metadata {
        headers.insert(format!("x-oss-meta-{}", k), v.clone());
    }
    headers
}

fn no_such_key() -> OssError {
    OssError::Server {
        status: 404,
        code: "NoSuchKey".to_string(),
        message: "The specified key does not exist.".to_string(),
        request_id: "5C3D9175B6FC201293AD4890".to_string(),
    }
}

fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a String> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

fn oss_object(name: String, object: &StoredObject) -> OssObjectMeta {
    OssObjectMeta {
        name,
        last_modified: object.last_modified.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        etag: Some(object.etag.clone()),
        size: object.body.len() as u64,
    }
}

fn ok() -> OssResponse {
    OssResponse {
        status: 200,
        headers: HashMap::new(),
    }
}

#[async_trait]
impl OssClient for MemoryOss {
    async fn get(&self, bucket: &str, key: &str) -> Result<OssGetResult, OssError> {
        self.buckets.hit();
        let object = self.buckets.object(bucket, key).ok_or_else(no_such_key)?;
        Ok(OssGetResult {
            res: OssResponse {
                status: 200,
                headers: oss_headers(&object),
            },
            content: object.body,
        })
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<OssResponse, OssError> {
        self.buckets.hit();
        let object = self.buckets.object(bucket, key).ok_or_else(no_such_key)?;
        Ok(OssResponse {
            status: 200,
            headers: oss_headers(&object),
        })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        options: OssPutOptions,
    ) -> Result<OssResponse, OssError> {
        self.buckets.hit();
        let object = StoredObject::new(
            content,
            options.mime,
            header(&options.headers, "content-encoding").cloned(),
            options.meta,
        );
        self.buckets.store(bucket, key, object);
        Ok(ok())
    }

    async fn copy(
        &self,
        bucket: &str,
        key: &str,
        source_bucket: &str,
        source_key: &str,
        options: OssCopyOptions,
    ) -> Result<OssResponse, OssError> {
        self.buckets.hit();
        if let Some(status) = self.buckets.next_copy_failure() {
            return Err(OssError::Server {
                status,
                code: if status == 503 { "ServiceUnavailable" } else { "AccessDenied" }
                    .to_string(),
                message: "injected".to_string(),
                request_id: "0".to_string(),
            });
        }
        let source = self
            .buckets
            .object(source_bucket, source_key)
            .ok_or_else(no_such_key)?;
        let object = match options.meta {
            None => source,
            Some(meta) => StoredObject::new(
                source.body,
                options
                    .mime
                    .or_else(|| Some("application/octet-stream".to_string())),
                header(&options.headers, "content-encoding").cloned(),
                meta,
            ),
        };
        self.buckets.store(bucket, key, object);
        Ok(ok())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<OssResponse, OssError> {
        self.buckets.hit();
        self.buckets.remove(bucket, key);
        Ok(OssResponse {
            status: 204,
            headers: HashMap::new(),
        })
    }

    async fn delete_multi(
        &self,
        bucket: &str,
        keys: &[String],
        quiet: bool,
    ) -> Result<OssDeleteMultiResult, OssError> {
        self.buckets.hit();
        for key in keys {
            self.buckets.remove(bucket, key);
        }
        Ok(OssDeleteMultiResult {
            deleted: if quiet { Vec::new() } else { keys.to_vec() },
        })
    }

    async fn list(&self, bucket: &str, query: OssListQuery) -> Result<OssListResult, OssError> {
        self.buckets.hit();
        let (contents, prefixes, truncated) = self.buckets.page(
            bucket,
            query.prefix.as_deref(),
            query.delimiter.as_deref(),
            query.marker.as_deref(),
            query.max_keys,
        );
        let next_marker = if truncated {
            last_cursor(&contents, &prefixes)
        } else {
            // OSS sends an empty element on the last page
            Some(String::new())
        };
        Ok(OssListResult {
            objects: contents
                .iter()
                .map(|(k, o)| oss_object(k.clone(), o))
                .collect(),
            prefixes,
            is_truncated: truncated,
            next_marker,
        })
    }

    async fn list_v2(
        &self,
        bucket: &str,
        query: OssListV2Query,
    ) -> Result<OssListV2Result, OssError> {
        self.buckets.hit();
        let start = query
            .continuation_token
            .as_deref()
            .and_then(|t| t.strip_prefix("ct-"));
        let (contents, prefixes, truncated) = self.buckets.page(
            bucket,
            query.prefix.as_deref(),
            query.delimiter.as_deref(),
            start,
            query.max_keys,
        );
        let next = if truncated {
            last_cursor(&contents, &prefixes).map(|k| format!("ct-{}", k))
        } else {
            None
        };
        Ok(OssListV2Result {
            key_count: (contents.len() + prefixes.len()) as u32,
            objects: contents
                .iter()
                .map(|(k, o)| oss_object(k.clone(), o))
                .collect(),
            prefixes,
            is_truncated: truncated,
            next_continuation_token: next,
        })
    }

    fn signature_url(
        &self,
        bucket: &str,
        key: &str,
        options: OssSignatureOptions,
    ) -> Result<String, OssError> {
        self.buckets.signed();
        if options.expires == 0 || options.expires > MAX_EXPIRES {
            return Err(OssError::InvalidRequest("bad expiry".to_string()));
        }
        Ok(format!(
            "https://{}.oss-cn-hangzhou.aliyuncs.com/{}?Expires={}&method={}",
            bucket,
            key,
            options.expires,
            options.method.as_str()
        ))
    }
}

// ---- construction ----

/// Route library logs to the test harness; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn options(backend: &str, extra: Value) -> StorageOptions {
    let mut value = json!({
        "backendType": backend,
        "accessKeyID": "test-id",
        "accessKeySecret": "test-secret",
        "region": "us-east-1",
        "bucket": { "strategy": "fixed", "bucket": "b" },
        "retry": { "maxAttempts": 3, "baseDelayMs": 1, "maxDelayMs": 2 }
    });
    if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(value).unwrap()
}

/// Which fake sits behind a façade
pub enum Backend {
    S3(Arc<MemoryS3>),
    Oss(Arc<MemoryOss>),
}

impl Backend {
    pub fn buckets(&self) -> &Buckets {
        match self {
            Backend::S3(c) => &c.buckets,
            Backend::Oss(c) => &c.buckets,
        }
    }
}

pub fn s3_storage(extra: Value) -> (ObjectStorage, Backend) {
    let client = Arc::new(MemoryS3::default());
    let storage = ObjectStorage::with_s3_client(options("aws", extra), client.clone()).unwrap();
    (storage, Backend::S3(client))
}

pub fn oss_storage(extra: Value) -> (ObjectStorage, Backend) {
    let client = Arc::new(MemoryOss::default());
    let storage = ObjectStorage::with_oss_client(options("oss", extra), client.clone()).unwrap();
    (storage, Backend::Oss(client))
}

/// One façade per backend, built with the same extra options
pub fn both(extra: Value) -> Vec<(ObjectStorage, Backend)> {
    init_tracing();
    vec![s3_storage(extra.clone()), oss_storage(extra)]
}
