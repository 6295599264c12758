//! reqwest-backed S3 client / 基于reqwest的S3客户端

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{Client, Method, Response, StatusCode};
use url::Url;

use super::client::*;
use super::signer::{payload_hash, SigV4Signer};
use crate::config::{Addressing, ClientSettings};
use crate::drivers::xml::{delete_request_body, DeleteResult, ErrorBody, ListBucketResult};
use crate::utils::{
    content_md5, has_dot_segment, header_map, parse_http_date, parse_iso_date, uri_encode,
};

const META_PREFIX: &str = "x-amz-meta-";
const DEFAULT_REGION: &str = "us-east-1";

/// S3 over HTTP with SigV4 header signing / S3 HTTP客户端
pub struct HttpS3Client {
    client: Client,
    signer: SigV4Signer,
    addressing: Addressing,
}

impl HttpS3Client {
    pub fn new(settings: &ClientSettings) -> Result<Self, S3Error> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        let region = settings.addressing.region().unwrap_or(DEFAULT_REGION);
        let signer = SigV4Signer::new(
            &settings.credentials.access_key_id,
            &settings.credentials.access_key_secret,
            settings.credentials.security_token.as_deref(),
            region,
        );
        Ok(Self {
            client,
            signer,
            addressing: settings.addressing.clone(),
        })
    }

    /// Bucket root URL, ending in `/` / 存储桶根地址
    fn bucket_url(&self, bucket: &str) -> Result<Url, S3Error> {
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
            } => format!("https://{}.s3.{}.amazonaws.com/", bucket, region),
        };
        Url::parse(&raw).map_err(|e| S3Error::InvalidRequest(format!("bad URL {}: {}", raw, e)))
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, S3Error> {
        if has_dot_segment(key) {
            return Err(S3Error::InvalidRequest(format!(
                "key {} has a dot segment and cannot be addressed",
                key
            )));
        }
        let base = self.bucket_url(bucket)?;
        let raw = format!("{}{}", base, uri_encode(key, false));
        Url::parse(&raw).map_err(|e| S3Error::InvalidRequest(format!("bad URL {}: {}", raw, e)))
    }

    /// Sign and send; the caller checks the status
    async fn send(
        &self,
        method: Method,
        url: Url,
        mut headers: BTreeMap<String, String>,
        body: Bytes,
    ) -> Result<Response, S3Error> {
        let hash = payload_hash(&body);
        let auth = self
            .signer
            .sign_headers(method.as_str(), &url, &mut headers, &hash, Utc::now())?;

        tracing::debug!("S3 {} {}", method, url);
        let mut req = self.client.request(method, url).header("authorization", auth);
        for (name, value) in headers.iter().filter(|(k, _)| k.as_str() != "host") {
            req = req.header(name.as_str(), value.as_str());
        }
        Ok(req.body(body).send().await?)
    }

    async fn send_checked(
        &self,
        method: Method,
        url: Url,
        headers: BTreeMap<String, String>,
        body: Bytes,
        key: &str,
    ) -> Result<Response, S3Error> {
        let is_head = method == Method::HEAD;
        let resp = self.send(method, url, headers, body).await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        Err(error_from_response(resp, is_head, key).await)
    }

    async fn list_raw(
        &self,
        bucket: &str,
        query: Vec<(&str, String)>,
    ) -> Result<ListBucketResult, S3Error> {
        let mut url = self.bucket_url(bucket)?;
        if !query.is_empty() {
            url.set_query(Some(&encode_query(&query)));
        }
        let resp = self
            .send_checked(Method::GET, url, BTreeMap::new(), Bytes::new(), "")
            .await?;
        let text = resp.text().await?;
        quick_xml::de::from_str(&text)
            .map_err(|e| S3Error::Decode(format!("ListBucketResult: {}", e)))
    }
}

/// Turn a failed response into a typed error / 错误响应映射
async fn error_from_response(resp: Response, is_head: bool, key: &str) -> S3Error {
    let status = resp.status().as_u16();
    let request_id = resp
        .headers()
        .get("x-amz-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = resp.text().await.unwrap_or_default();
    map_error(status, is_head, &text, key, request_id)
}

/// Status and body of a failed response -> `S3Error`
fn map_error(
    status: u16,
    is_head: bool,
    body: &str,
    key: &str,
    request_id: Option<String>,
) -> S3Error {
    match ErrorBody::parse(body) {
        Some(err) if err.code == "NoSuchKey" => S3Error::NoSuchKey(key.to_string()),
        Some(err) => S3Error::Service {
            status,
            code: err.code,
            message: err.message,
            request_id: err.request_id.or(request_id),
        },
        // HEAD responses carry no body
        None if is_head && status == 404 => S3Error::NotFound,
        None => S3Error::Service {
            status,
            code: StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown")
                .replace(' ', ""),
            message: body.to_string(),
            request_id,
        },
    }
}

/// CopyObject can fail after a 200 status line; the error is in the body
fn copy_outcome(status: u16, body: &str) -> Result<(), S3Error> {
    match ErrorBody::parse(body) {
        Some(err) => Err(S3Error::Service {
            status,
            code: err.code,
            message: err.message,
            request_id: err.request_id,
        }),
        None => Ok(()),
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

fn user_metadata(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix(META_PREFIX)
                .map(|name| (name.to_string(), v.clone()))
        })
        .collect()
}

fn content_headers(
    headers: &mut BTreeMap<String, String>,
    content_type: &Option<String>,
    content_encoding: &Option<String>,
    content_disposition: &Option<String>,
    cache_control: &Option<String>,
    metadata: &HashMap<String, String>,
) {
    let standard = [
        ("content-type", content_type),
        ("content-encoding", content_encoding),
        ("content-disposition", content_disposition),
        ("cache-control", cache_control),
    ];
    for (name, value) in standard {
        if let Some(v) = value {
            headers.insert(name.to_string(), v.clone());
        }
    }
    for (k, v) in metadata {
        headers.insert(format!("{}{}", META_PREFIX, k.to_lowercase()), v.clone());
    }
}

fn push_opt(query: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<String>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        query.push((name, v));
    }
}

fn objects_from(result: &mut ListBucketResult) -> (Vec<S3Object>, Vec<String>) {
    let objects = result
        .contents
        .drain(..)
        .map(|c| S3Object {
            last_modified: c.last_modified.as_deref().and_then(parse_iso_date),
            key: c.key,
            e_tag: c.etag,
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

#[async_trait]
impl S3Client for HttpS3Client {
    async fn get_object(&self, input: ObjectRef) -> Result<GetObjectOutput, S3Error> {
        let url = self.object_url(&input.bucket, &input.key)?;
        let resp = self
            .send_checked(Method::GET, url, BTreeMap::new(), Bytes::new(), &input.key)
            .await?;
        let headers = header_map(resp.headers());
        let body = resp.bytes().await?;
        Ok(GetObjectOutput {
            content_type: headers.get("content-type").cloned(),
            content_length: headers.get("content-length").and_then(|v| v.parse().ok()),
            content_encoding: headers.get("content-encoding").cloned(),
            e_tag: headers.get("etag").cloned(),
            metadata: user_metadata(&headers),
            body,
        })
    }

    async fn head_object(&self, input: ObjectRef) -> Result<HeadObjectOutput, S3Error> {
        let url = self.object_url(&input.bucket, &input.key)?;
        let resp = self
            .send_checked(Method::HEAD, url, BTreeMap::new(), Bytes::new(), &input.key)
            .await?;
        let headers = header_map(resp.headers());
        Ok(HeadObjectOutput {
            content_type: headers.get("content-type").cloned(),
            content_length: headers.get("content-length").and_then(|v| v.parse().ok()),
            content_encoding: headers.get("content-encoding").cloned(),
            accept_ranges: headers.get("accept-ranges").cloned(),
            e_tag: headers.get("etag").cloned(),
            last_modified: headers.get("last-modified").and_then(|v| parse_http_date(v)),
            metadata: user_metadata(&headers),
        })
    }

    async fn put_object(&self, input: PutObjectInput) -> Result<(), S3Error> {
        let url = self.object_url(&input.bucket, &input.key)?;
        let mut headers = BTreeMap::new();
        content_headers(
            &mut headers,
            &input.content_type,
            &input.content_encoding,
            &input.content_disposition,
            &input.cache_control,
            &input.metadata,
        );
        self.send_checked(Method::PUT, url, headers, input.body, &input.key)
            .await?;
        Ok(())
    }

    async fn copy_object(&self, input: CopyObjectInput) -> Result<(), S3Error> {
        let url = self.object_url(&input.bucket, &input.key)?;
        let mut headers = BTreeMap::new();
        headers.insert(
            "x-amz-copy-source".to_string(),
            format!(
                "/{}/{}",
                input.source_bucket,
                uri_encode(&input.source_key, false)
            ),
        );
        headers.insert(
            "x-amz-metadata-directive".to_string(),
            input.metadata_directive.as_str().to_string(),
        );
        if input.metadata_directive == MetadataDirective::Replace {
            content_headers(
                &mut headers,
                &input.content_type,
                &input.content_encoding,
                &input.content_disposition,
                &input.cache_control,
                &input.metadata,
            );
        }
        let resp = self
            .send_checked(Method::PUT, url, headers, Bytes::new(), &input.source_key)
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        copy_outcome(status, &text)
    }

    async fn delete_object(&self, input: ObjectRef) -> Result<(), S3Error> {
        let url = self.object_url(&input.bucket, &input.key)?;
        self.send_checked(Method::DELETE, url, BTreeMap::new(), Bytes::new(), &input.key)
            .await?;
        Ok(())
    }

    async fn delete_objects(
        &self,
        input: DeleteObjectsInput,
    ) -> Result<DeleteObjectsOutput, S3Error> {
        let mut url = self.bucket_url(&input.bucket)?;
        url.set_query(Some("delete"));
        let body = Bytes::from(delete_request_body(&input.keys, input.quiet));
        let mut headers = BTreeMap::new();
        headers.insert("content-md5".to_string(), content_md5(&body));
        headers.insert("content-type".to_string(), "application/xml".to_string());

        let resp = self
            .send_checked(Method::POST, url, headers, body, "")
            .await?;
        let text = resp.text().await?;
        let result: DeleteResult = quick_xml::de::from_str(&text)
            .map_err(|e| S3Error::Decode(format!("DeleteResult: {}", e)))?;
        Ok(DeleteObjectsOutput {
            deleted: result.deleted.into_iter().map(|d| d.key).collect(),
            errors: result
                .errors
                .into_iter()
                .map(|e| DeleteObjectError {
                    key: e.key,
                    code: e.code,
                    message: e.message,
                })
                .collect(),
        })
    }

    async fn list_objects(&self, input: ListObjectsInput) -> Result<ListObjectsOutput, S3Error> {
        let mut query = Vec::new();
        push_opt(&mut query, "delimiter", input.delimiter);
        push_opt(&mut query, "marker", input.marker);
        push_opt(&mut query, "max-keys", input.max_keys.map(|m| m.to_string()));
        push_opt(&mut query, "prefix", input.prefix);

        let mut result = self.list_raw(&input.bucket, query).await?;
        let (contents, common_prefixes) = objects_from(&mut result);
        Ok(ListObjectsOutput {
            contents,
            common_prefixes,
            is_truncated: result.is_truncated,
            next_marker: result.next_marker,
        })
    }

    async fn list_objects_v2(
        &self,
        input: ListObjectsV2Input,
    ) -> Result<ListObjectsV2Output, S3Error> {
        let mut query = vec![("list-type", "2".to_string())];
        push_opt(&mut query, "continuation-token", input.continuation_token);
        push_opt(&mut query, "delimiter", input.delimiter);
        push_opt(&mut query, "max-keys", input.max_keys.map(|m| m.to_string()));
        push_opt(&mut query, "prefix", input.prefix);

        let mut result = self.list_raw(&input.bucket, query).await?;
        let (contents, common_prefixes) = objects_from(&mut result);
        Ok(ListObjectsV2Output {
            key_count: result.key_count.unwrap_or(contents.len() as u32),
            contents,
            common_prefixes,
            is_truncated: result.is_truncated,
            next_continuation_token: result.next_continuation_token,
        })
    }

    async fn presign(&self, input: PresignInput) -> Result<String, S3Error> {
        let url = self.object_url(&input.bucket, &input.key)?;
        let signed = self.signer.presign(
            input.method.as_str(),
            &url,
            input.expires_in.as_secs(),
            Utc::now(),
        )?;
        Ok(signed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use std::time::Duration;

    fn settings(addressing: Addressing) -> ClientSettings {
        ClientSettings {
            credentials: Credentials {
                access_key_id: "AKID".to_string(),
                access_key_secret: "SECRET".to_string(),
                security_token: None,
            },
            addressing,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_path_style_urls() {
        let client = HttpS3Client::new(&settings(Addressing::PathStyle {
            endpoint: Url::parse("http://127.0.0.1:9000").unwrap(),
            region: None,
        }))
        .unwrap();
        assert_eq!(
            client.object_url("media", "a b/c.txt").unwrap().as_str(),
            "http://127.0.0.1:9000/media/a%20b/c.txt"
        );
        assert_eq!(
            client.bucket_url("media").unwrap().as_str(),
            "http://127.0.0.1:9000/media/"
        );
    }

    #[test]
    fn test_virtual_hosted_urls() {
        let client = HttpS3Client::new(&settings(Addressing::VirtualHosted {
            region: "eu-west-1".to_string(),
            endpoint: None,
        }))
        .unwrap();
        assert_eq!(
            client.object_url("media", "x/y.txt").unwrap().as_str(),
            "https://media.s3.eu-west-1.amazonaws.com/x/y.txt"
        );

        let custom = HttpS3Client::new(&settings(Addressing::VirtualHosted {
            region: "auto".to_string(),
            endpoint: Some(Url::parse("https://storage.example.com").unwrap()),
        }))
        .unwrap();
        assert_eq!(
            custom.object_url("media", "k").unwrap().as_str(),
            "https://media.storage.example.com/k"
        );
    }

    #[test]
    fn test_dot_segment_keys_are_rejected() {
        let client = HttpS3Client::new(&settings(Addressing::PathStyle {
            endpoint: Url::parse("http://127.0.0.1:9000").unwrap(),
            region: None,
        }))
        .unwrap();
        let err = client.object_url("b", "a/../b").unwrap_err();
        assert!(matches!(err, S3Error::InvalidRequest(_)));
        assert!(client.object_url("b", "./a").is_err());
        assert_eq!(
            client.object_url("b", "a/..b/.c").unwrap().as_str(),
            "http://127.0.0.1:9000/b/a/..b/.c"
        );
    }

    #[test]
    fn test_map_error_not_found() {
        let err = map_error(404, true, "", "a.txt", Some("req".to_string()));
        assert!(matches!(err, S3Error::NotFound));
        assert!(err.is_not_found());

        let body = "<Error><Code>NoSuchKey</Code><Message>missing</Message></Error>";
        let err = map_error(404, false, body, "a.txt", None);
        assert!(matches!(err, S3Error::NoSuchKey(ref k) if k == "a.txt"));

        // a bodiless 404 on GET is not a missing key
        let err = map_error(404, false, "", "a.txt", None);
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_map_error_service() {
        let body = "<Error><Code>SlowDown</Code><Message>reduce rate</Message>\
                    <RequestId>R1</RequestId></Error>";
        match map_error(503, false, body, "k", Some("H1".to_string())) {
            S3Error::Service {
                status,
                code,
                request_id,
                ..
            } => {
                assert_eq!(status, 503);
                assert_eq!(code, "SlowDown");
                assert_eq!(request_id.as_deref(), Some("R1"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = map_error(500, false, "boom", "k", Some("H1".to_string()));
        assert!(err.is_transient());
        match err {
            S3Error::Service {
                code,
                message,
                request_id,
                ..
            } => {
                assert_eq!(code, "InternalServerError");
                assert_eq!(message, "boom");
                assert_eq!(request_id.as_deref(), Some("H1"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_copy_outcome_reads_error_body() {
        let ok = r#"<CopyObjectResult><ETag>"e"</ETag></CopyObjectResult>"#;
        assert!(copy_outcome(200, ok).is_ok());

        let failed = "<Error><Code>InternalError</Code><Message>try again</Message></Error>";
        let err = copy_outcome(200, failed).unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, S3Error::Service { ref code, .. } if code == "InternalError"));
    }

    #[test]
    fn test_encode_query() {
        let q = encode_query(&[
            ("list-type", "2".to_string()),
            ("prefix", "a b/".to_string()),
        ]);
        assert_eq!(q, "list-type=2&prefix=a%20b%2F");
    }

    #[test]
    fn test_user_metadata_strips_prefix() {
        let mut headers = HashMap::new();
        headers.insert("x-amz-meta-owner".to_string(), "alice".to_string());
        headers.insert("content-type".to_string(), "text/plain".to_string());
        let meta = user_metadata(&headers);
        assert_eq!(meta.len(), 1);
        assert_eq!(meta["owner"], "alice");
    }

    #[tokio::test]
    async fn test_presign_url_shape() {
        let client = HttpS3Client::new(&settings(Addressing::PathStyle {
            endpoint: Url::parse("http://localhost:9000").unwrap(),
            region: Some("us-east-1".to_string()),
        }))
        .unwrap();
        let url = client
            .presign(PresignInput {
                bucket: "media".to_string(),
                key: "a.txt".to_string(),
                method: crate::models::SignMethod::Put,
                expires_in: Duration::from_secs(600),
            })
            .await
            .unwrap();
        assert!(url.starts_with("http://localhost:9000/media/a.txt?X-Amz-Algorithm="));
        assert!(url.contains("X-Amz-Expires=600"));
        assert!(url.contains("X-Amz-Signature="));
    }
}
