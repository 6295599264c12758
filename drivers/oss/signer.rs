//! OSS header signature v1 / OSS签名
//!
//! `Signature = base64(hmac-sha1(AccessKeySecret, StringToSign))` where
//! `StringToSign = VERB\nContent-MD5\nContent-Type\nDate\nCanonicalizedOSSHeaders CanonicalizedResource`.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::client::OssError;

type HmacSha1 = Hmac<Sha1>;

pub const OSS_SECURITY_TOKEN_HEADER: &str = "x-oss-security-token";

/// Query parameters that take part in the canonicalized resource
const SIGNED_SUBRESOURCES: &[&str] = &[
    "acl",
    "continuation-token",
    "delete",
    "security-token",
    "uploadId",
    "uploads",
    "partNumber",
];

#[derive(Debug, Clone)]
pub struct OssSigner {
    access_key_id: String,
    access_key_secret: String,
    security_token: Option<String>,
}

impl OssSigner {
    pub fn new(access_key_id: &str, access_key_secret: &str, security_token: Option<&str>) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            access_key_secret: access_key_secret.to_string(),
            security_token: security_token.map(str::to_string),
        }
    }

    pub fn security_token(&self) -> Option<&str> {
        self.security_token.as_deref()
    }

    fn sign(&self, string_to_sign: &str) -> Result<String, OssError> {
        let mut mac = HmacSha1::new_from_slice(self.access_key_secret.as_bytes())
            .map_err(|e| OssError::InvalidRequest(format!("HMAC key error: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// `Authorization` header for a request. `headers` holds every header
    /// that will be sent, with lowercase names.
    pub fn authorization(
        &self,
        verb: &str,
        headers: &BTreeMap<String, String>,
        resource: &str,
    ) -> Result<String, OssError> {
        let get = |name: &str| headers.get(name).map(String::as_str).unwrap_or("");
        let oss_headers: String = headers
            .iter()
            .filter(|(k, _)| k.starts_with("x-oss-"))
            .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
            .collect();
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}\n{}{}",
            verb,
            get("content-md5"),
            get("content-type"),
            get("date"),
            oss_headers,
            resource
        );
        tracing::debug!("OSS string to sign: {:?}", string_to_sign);
        Ok(format!(
            "OSS {}:{}",
            self.access_key_id,
            self.sign(&string_to_sign)?
        ))
    }

    /// Query parameters of a signed URL expiring at `expires_at` (unix
    /// seconds). `resource` must not carry the security token yet.
    pub fn presign_query(
        &self,
        verb: &str,
        resource: &str,
        expires_at: i64,
    ) -> Result<Vec<(String, String)>, OssError> {
        let resource = match self.security_token {
            Some(ref token) => format!("{}?security-token={}", resource, token),
            None => resource.to_string(),
        };
        let string_to_sign = format!("{}\n\n\n{}\n{}", verb, expires_at, resource);
        let mut query = vec![
            ("OSSAccessKeyId".to_string(), self.access_key_id.clone()),
            ("Expires".to_string(), expires_at.to_string()),
            ("Signature".to_string(), self.sign(&string_to_sign)?),
        ];
        if let Some(ref token) = self.security_token {
            query.push(("security-token".to_string(), token.clone()));
        }
        Ok(query)
    }
}

/// `/bucket/key` plus signed sub-resources in sorted order / 规范化资源
pub fn canonical_resource(bucket: &str, key: &str, query: &[(&str, String)]) -> String {
    let mut resource = format!("/{}/{}", bucket, key);
    let mut subresources: Vec<String> = query
        .iter()
        .filter(|(k, _)| SIGNED_SUBRESOURCES.contains(k))
        .map(|(k, v)| {
            if v.is_empty() {
                k.to_string()
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect();
    if !subresources.is_empty() {
        subresources.sort();
        resource.push('?');
        resource.push_str(&subresources.join("&"));
    }
    resource
}
