//! reqwest-backed OSS client / 基于reqwest的OSS客户端

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{Client, Method, Response};
use url::Url;

use super::client::*;
use super::signer::{canonical_resource, OssSigner, OSS_SECURITY_TOKEN_HEADER};
use crate::config::{Addressing, ClientSettings};
use crate::drivers::xml::{delete_request_body, DeleteResult, ErrorBody, ListBucketResult};
use crate::utils::{content_md5, gmt_date, has_dot_segment, header_map, uri_encode};

/// Longest validity accepted for a signed URL (7 days)
const MAX_SIGNATURE_EXPIRES: u64 = 604_800;

/// OSS over HTTP with header signature v1 / OSS HTTP客户端
pub struct HttpOssClient {
    client: Client,
    signer: OssSigner,
    addressing: Addressing,
}

/// `cn-hangzhou` -> `oss-cn-hangzhou`
fn oss_region(region: &str) -> String {
    if region.starts_with("oss-") {
        region.to_string()
    } else {
        format!("oss-{}", region)
    }
}

impl HttpOssClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, OssError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            signer: OssSigner::new(
                &settings.credentials.access_key_id,
                &settings.credentials.access_key_secret,
                settings.credentials.security_token.as_deref(),
            ),
            addressing: settings.addressing.clone(),
        })
    }

    fn bucket_url(&self, bucket: &str) -> Result<Url, OssError> {
        let raw = match &self.addressing {
            Addressing::PathStyle { endpoint, .. } => format!(
                "{}/{}/",
                endpoint.as_str().trim_end_matches('/'),
                uri_encode(bucket, true)
            ),
            Addressing::VirtualHosted {
                endpoint: Some(endpoint),
                ..
            } => {
                let host = endpoint.host_str().unwrap_or_default();
                let port = endpoint.port().map(|p| format!(":{}", p)).unwrap_or_default();
                format!("{}://{}.{}{}/", endpoint.scheme(), bucket, host, port)
            }
            Addressing::VirtualHosted {
                region,
                endpoint: None,
            } => format!("https://{}.{}.aliyuncs.com/", bucket, oss_region(region)),
        };
        Url::parse(&raw).map_err(|e| OssError::InvalidRequest(format!("bad URL {}: {}", raw, e)))
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, OssError> {
        if has_dot_segment(key) {
            return Err(OssError::InvalidRequest(format!(
                "key {} has a dot segment and cannot be addressed",
                key
            )));
        }
        let raw = format!("{}{}", self.bucket_url(bucket)?, uri_encode(key, false));
        Url::parse(&raw).map_err(|e| OssError::InvalidRequest(format!("bad URL {}: {}", raw, e)))
    }

    /// Sign, send and check the status / 签名并发送请求
    async fn request(
        &self,
        method: Method,
        bucket: &str,
        key: &str,
        query: Vec<(&str, String)>,
        mut headers: BTreeMap<String, String>,
        body: Bytes,
    ) -> Result<Response, OssError> {
        let mut url = if key.is_empty() {
            self.bucket_url(bucket)?
        } else {
            self.object_url(bucket, key)?
        };
        if !query.is_empty() {
            url.set_query(Some(&encode_query(&query)));
        }

        headers.insert("date".to_string(), gmt_date(Utc::now()));
        if let Some(token) = self.signer.security_token() {
            headers.insert(OSS_SECURITY_TOKEN_HEADER.to_string(), token.to_string());
        }
        let resource = canonical_resource(bucket, key, &query);
        let auth = self
            .signer
            .authorization(method.as_str(), &headers, &resource)?;

        tracing::debug!("OSS {} {}", method, url);
        let is_head = method == Method::HEAD;
        let mut req = self.client.request(method, url).header("authorization", auth);
        for (name, value) in &headers {
            req = req.header(name.as_str(), value.as_str());
        }
        let resp = req.body(body).send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        Err(error_from_response(resp, is_head).await)
    }
}

async fn error_from_response(resp: Response, is_head: bool) -> OssError {
    let status = resp.status().as_u16();
    let header_request_id = resp
        .headers()
        .get("x-oss-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let text = resp.text().await.unwrap_or_default();
    map_error(status, is_head, &text, header_request_id)
}

/// Status and body of a failed response -> `OssError`
fn map_error(status: u16, is_head: bool, body: &str, header_request_id: String) -> OssError {
    match ErrorBody::parse(body) {
        Some(err) => OssError::Server {
            status,
            code: err.code,
            message: err.message,
            request_id: err.request_id.unwrap_or(header_request_id),
        },
        // HEAD responses carry no body
        None if is_head && status == 404 => OssError::Server {
            status,
            code: "NoSuchKey".to_string(),
            message: "Object not exists".to_string(),
            request_id: header_request_id,
        },
        None => OssError::Server {
            status,
            code: "Unknown".to_string(),
            message: body.to_string(),
            request_id: header_request_id,
        },
    }
}

fn encode_query(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| {
            if v.is_empty() {
                uri_encode(k, true)
            } else {
                format!("{}={}", uri_encode(k, true), uri_encode(v, true))
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn push_opt(query: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<String>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        query.push((name, v));
    }
}

fn insert_meta(headers: &mut BTreeMap<String, String>, meta: &HashMap<String, String>) {
    for (k, v) in meta {
        headers.insert(format!("{}{}", OSS_META_PREFIX, k.to_lowercase()), v.clone());
    }
}

fn insert_extra(headers: &mut BTreeMap<String, String>, extra: &HashMap<String, String>) {
    for (k, v) in extra {
        headers.insert(k.to_lowercase(), v.clone());
    }
}

fn into_response(resp: &Response) -> OssResponse {
    OssResponse {
        status: resp.status().as_u16(),
        headers: header_map(resp.headers()),
    }
}

fn objects_of(result: &mut ListBucketResult) -> (Vec<OssObjectMeta>, Vec<String>) {
    let objects = result
        .contents
        .drain(..)
        .map(|c| OssObjectMeta {
            name: c.key,
            last_modified: c.last_modified.unwrap_or_default(),
            etag: c.etag,
            size: c.size,
        })
        .collect();
    let prefixes = result
        .common_prefixes
        .drain(..)
        .map(|p| p.prefix)
        .collect();
    (objects, prefixes)
}

impl HttpOssClient {
    async fn list_raw(
        &self,
        bucket: &str,
        query: Vec<(&str, String)>,
    ) -> Result<ListBucketResult, OssError> {
        let resp = self
            .request(Method::GET, bucket, "", query, BTreeMap::new(), Bytes::new())
            .await?;
        let text = resp.text().await?;
        quick_xml::de::from_str(&text)
            .map_err(|e| OssError::Decode(format!("ListBucketResult: {}", e)))
    }
}

#[async_trait]
impl OssClient for HttpOssClient {
    async fn get(&self, bucket: &str, key: &str) -> Result<OssGetResult, OssError> {
        let resp = self
            .request(Method::GET, bucket, key, Vec::new(), BTreeMap::new(), Bytes::new())
            .await?;
        let res = into_response(&resp);
        let content = resp.bytes().await?;
        Ok(OssGetResult { content, res })
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<OssResponse, OssError> {
        let resp = self
            .request(Method::HEAD, bucket, key, Vec::new(), BTreeMap::new(), Bytes::new())
            .await?;
        Ok(into_response(&resp))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        options: OssPutOptions,
    ) -> Result<OssResponse, OssError> {
        let mut headers = BTreeMap::new();
        insert_extra(&mut headers, &options.headers);
        if let Some(mime) = options.mime {
            headers.insert("content-type".to_string(), mime);
        }
        insert_meta(&mut headers, &options.meta);
        let resp = self
            .request(Method::PUT, bucket, key, Vec::new(), headers, content)
            .await?;
        Ok(into_response(&resp))
    }

    async fn copy(
        &self,
        bucket: &str,
        key: &str,
        source_bucket: &str,
        source_key: &str,
        options: OssCopyOptions,
    ) -> Result<OssResponse, OssError> {
        let mut headers = BTreeMap::new();
        insert_extra(&mut headers, &options.headers);
        headers.insert(
            "x-oss-copy-source".to_string(),
            format!("/{}/{}", source_bucket, uri_encode(source_key, false)),
        );
        match options.meta {
            Some(ref meta) => {
                headers.insert("x-oss-metadata-directive".to_string(), "REPLACE".to_string());
                insert_meta(&mut headers, meta);
                if let Some(mime) = options.mime {
                    headers.insert("content-type".to_string(), mime);
                }
            }
            None => {
                headers.insert("x-oss-metadata-directive".to_string(), "COPY".to_string());
            }
        }
        let resp = self
            .request(Method::PUT, bucket, key, Vec::new(), headers, Bytes::new())
            .await?;
        Ok(into_response(&resp))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<OssResponse, OssError> {
        let resp = self
            .request(Method::DELETE, bucket, key, Vec::new(), BTreeMap::new(), Bytes::new())
            .await?;
        Ok(into_response(&resp))
    }

    async fn delete_multi(
        &self,
        bucket: &str,
        keys: &[String],
        quiet: bool,
    ) -> Result<OssDeleteMultiResult, OssError> {
        let body = Bytes::from(delete_request_body(keys, quiet));
        let mut headers = BTreeMap::new();
        headers.insert("content-md5".to_string(), content_md5(&body));
        headers.insert("content-type".to_string(), "application/xml".to_string());
        let resp = self
            .request(
                Method::POST,
                bucket,
                "",
                vec![("delete", String::new())],
                headers,
                body,
            )
            .await?;
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(OssDeleteMultiResult::default());
        }
        let result: DeleteResult = quick_xml::de::from_str(&text)
            .map_err(|e| OssError::Decode(format!("DeleteResult: {}", e)))?;
        Ok(OssDeleteMultiResult {
            deleted: result.deleted.into_iter().map(|d| d.key).collect(),
        })
    }

    async fn list(&self, bucket: &str, query: OssListQuery) -> Result<OssListResult, OssError> {
        let mut params = Vec::new();
        push_opt(&mut params, "delimiter", query.delimiter);
        push_opt(&mut params, "marker", query.marker);
        push_opt(&mut params, "max-keys", query.max_keys.map(|m| m.to_string()));
        push_opt(&mut params, "prefix", query.prefix);

        let mut result = self.list_raw(bucket, params).await?;
        let (objects, prefixes) = objects_of(&mut result);
        Ok(OssListResult {
            objects,
            prefixes,
            is_truncated: result.is_truncated,
            next_marker: result.next_marker,
        })
    }

    async fn list_v2(
        &self,
        bucket: &str,
        query: OssListV2Query,
    ) -> Result<OssListV2Result, OssError> {
        let mut params = vec![("list-type", "2".to_string())];
        push_opt(&mut params, "continuation-token", query.continuation_token);
        push_opt(&mut params, "delimiter", query.delimiter);
        push_opt(&mut params, "max-keys", query.max_keys.map(|m| m.to_string()));
        push_opt(&mut params, "prefix", query.prefix);

        let mut result = self.list_raw(bucket, params).await?;
        let (objects, prefixes) = objects_of(&mut result);
        Ok(OssListV2Result {
            key_count: result.key_count.unwrap_or(objects.len() as u32),
            objects,
            prefixes,
            is_truncated: result.is_truncated,
            next_continuation_token: result.next_continuation_token,
        })
    }

    fn signature_url(
        &self,
        bucket: &str,
        key: &str,
        options: OssSignatureOptions,
    ) -> Result<String, OssError> {
        if options.expires == 0 || options.expires > MAX_SIGNATURE_EXPIRES {
            return Err(OssError::InvalidRequest(format!(
                "expires must be between 1 and {} seconds, got {}",
                MAX_SIGNATURE_EXPIRES, options.expires
            )));
        }
        let expires_at = Utc::now().timestamp() + options.expires as i64;
        let resource = canonical_resource(bucket, key, &[]);
        let query = self
            .signer
            .presign_query(options.method.as_str(), &resource, expires_at)?;

        let mut url = self.object_url(bucket, key)?;
        let pairs: Vec<(&str, String)> = query.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        url.set_query(Some(&encode_query(&pairs)));
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::models::SignMethod;
    use std::time::Duration;

    fn client(addressing: Addressing) -> HttpOssClient {
        HttpOssClient::new(&ClientSettings {
            credentials: Credentials {
                access_key_id: "id".to_string(),
                access_key_secret: "secret".to_string(),
                security_token: None,
            },
            addressing,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_region_host() {
        let c = client(Addressing::VirtualHosted {
            region: "cn-hangzhou".to_string(),
            endpoint: None,
        });
        assert_eq!(
            c.object_url("b", "a/b.txt").unwrap().as_str(),
            "https://b.oss-cn-hangzhou.aliyuncs.com/a/b.txt"
        );
        assert_eq!(oss_region("oss-us-west-1"), "oss-us-west-1");
    }

    #[test]
    fn test_dot_segment_keys_are_rejected() {
        let c = client(Addressing::VirtualHosted {
            region: "cn-hangzhou".to_string(),
            endpoint: None,
        });
        let err = c.object_url("b", "a/../b").unwrap_err();
        assert!(matches!(err, OssError::InvalidRequest(_)));
        assert!(c.object_url("b", "a/.").is_err());
        assert!(c
            .signature_url(
                "b",
                "logs/../secret.txt",
                OssSignatureOptions {
                    expires: 60,
                    method: SignMethod::Get,
                },
            )
            .is_err());
    }

    #[test]
    fn test_map_error() {
        let err = map_error(404, true, "", "RID".to_string());
        assert!(err.is_not_found());

        let body = "<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message>\
                    <RequestId>5C3D9175B6FC201293AD4890</RequestId></Error>";
        let err = map_error(404, false, body, "RID".to_string());
        assert!(err.is_not_found());
        match err {
            OssError::Server { request_id, .. } => {
                assert_eq!(request_id, "5C3D9175B6FC201293AD4890")
            }
            other => panic!("unexpected {:?}", other),
        }

        let body = "<Error><Code>AccessDenied</Code><Message>denied</Message></Error>";
        let err = map_error(403, false, body, "RID".to_string());
        assert!(!err.is_not_found());
        assert!(!err.is_transient());
        match err {
            OssError::Server { code, request_id, .. } => {
                assert_eq!(code, "AccessDenied");
                assert_eq!(request_id, "RID");
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = map_error(502, false, "bad gateway", String::new());
        assert!(err.is_transient());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_signature_url() {
        let c = client(Addressing::VirtualHosted {
            region: "oss-cn-beijing".to_string(),
            endpoint: None,
        });
        let url = c
            .signature_url(
                "b",
                "dir/file name.txt",
                OssSignatureOptions {
                    expires: 600,
                    method: SignMethod::Get,
                },
            )
            .unwrap();
        assert!(url.starts_with(
            "https://b.oss-cn-beijing.aliyuncs.com/dir/file%20name.txt?OSSAccessKeyId=id&Expires="
        ));
        assert!(url.contains("&Signature="));

        let err = c
            .signature_url(
                "b",
                "k",
                OssSignatureOptions {
                    expires: MAX_SIGNATURE_EXPIRES + 1,
                    method: SignMethod::Put,
                },
            )
            .unwrap_err();
        assert!(matches!(err, OssError::InvalidRequest(_)));
    }
}
