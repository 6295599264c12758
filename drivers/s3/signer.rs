//! AWS Signature Version 4 / S3签名
//!
//! Header signing for regular requests and query signing for pre-signed URLs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use super::client::S3Error;
use crate::utils::{host_with_port, uri_encode};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
/// Longest validity S3 accepts for a pre-signed URL (7 days)
pub const MAX_PRESIGN_EXPIRES: u64 = 604_800;

/// Hex SHA-256 of a request body
pub fn payload_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, S3Error> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| S3Error::InvalidRequest(format!("HMAC key error: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[derive(Debug, Clone)]
pub struct SigV4Signer {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
    region: String,
}

impl SigV4Signer {
    pub fn new(
        access_key_id: &str,
        secret_access_key: &str,
        session_token: Option<&str>,
        region: &str,
    ) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: session_token.map(str::to_string),
            region: region.to_string(),
        }
    }

    fn scope(&self, date_stamp: &str) -> String {
        format!("{}/{}/{}/aws4_request", date_stamp, self.region, SERVICE)
    }

    fn signature(&self, date_stamp: &str, string_to_sign: &str) -> Result<String, S3Error> {
        let k_date = hmac_sha256(
            format!("AWS4{}", self.secret_access_key).as_bytes(),
            date_stamp.as_bytes(),
        )?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, SERVICE.as_bytes())?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        Ok(hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes())?))
    }

    fn string_to_sign(&self, amz_date: &str, date_stamp: &str, canonical_request: &str) -> String {
        format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            self.scope(date_stamp),
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        )
    }

    /// Sign a request in place: adds `host`, `x-amz-date`,
    /// `x-amz-content-sha256` (and the session token) to `headers`, then
    /// returns the `Authorization` value. Header names must be lowercase.
    pub fn sign_headers(
        &self,
        method: &str,
        url: &Url,
        headers: &mut BTreeMap<String, String>,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<String, S3Error> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let host = host_with_port(url)
            .ok_or_else(|| S3Error::InvalidRequest(format!("URL has no host: {}", url)))?;

        headers.insert("host".to_string(), host);
        headers.insert("x-amz-date".to_string(), amz_date.clone());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.to_string());
        if let Some(ref token) = self.session_token {
            headers.insert("x-amz-security-token".to_string(), token.clone());
        }

        let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
            .collect();
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            canonical_uri(url),
            canonical_query(url, &[]),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let string_to_sign = self.string_to_sign(&amz_date, &date_stamp, &canonical_request);
        let signature = self.signature(&date_stamp, &string_to_sign)?;
        Ok(format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM,
            self.access_key_id,
            self.scope(&date_stamp),
            signed_headers,
            signature
        ))
    }

    /// Query-signed URL valid for `expires` seconds / 生成预签名URL
    pub fn presign(
        &self,
        method: &str,
        url: &Url,
        expires: u64,
        now: DateTime<Utc>,
    ) -> Result<Url, S3Error> {
        if expires == 0 || expires > MAX_PRESIGN_EXPIRES {
            return Err(S3Error::InvalidRequest(format!(
                "expires must be between 1 and {} seconds, got {}",
                MAX_PRESIGN_EXPIRES, expires
            )));
        }
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let host = host_with_port(url)
            .ok_or_else(|| S3Error::InvalidRequest(format!("URL has no host: {}", url)))?;

        let mut extra = vec![
            ("X-Amz-Algorithm".to_string(), ALGORITHM.to_string()),
            (
                "X-Amz-Credential".to_string(),
                format!("{}/{}", self.access_key_id, self.scope(&date_stamp)),
            ),
            ("X-Amz-Date".to_string(), amz_date.clone()),
            ("X-Amz-Expires".to_string(), expires.to_string()),
            ("X-Amz-SignedHeaders".to_string(), "host".to_string()),
        ];
        if let Some(ref token) = self.session_token {
            extra.push(("X-Amz-Security-Token".to_string(), token.clone()));
        }

        let query = canonical_query(url, &extra);
        let canonical_request = format!(
            "{}\n{}\n{}\nhost:{}\n\nhost\n{}",
            method,
            canonical_uri(url),
            query,
            host,
            UNSIGNED_PAYLOAD
        );
        let string_to_sign = self.string_to_sign(&amz_date, &date_stamp, &canonical_request);
        let signature = self.signature(&date_stamp, &string_to_sign)?;

        let mut signed = url.clone();
        signed.set_query(Some(&format!("{}&X-Amz-Signature={}", query, signature)));
        Ok(signed)
    }
}

/// Object keys are encoded once when the URL is built; S3 does not
/// double-encode the path.
fn canonical_uri(url: &Url) -> String {
    match url.path() {
        "" => "/".to_string(),
        path => path.to_string(),
    }
}

/// Sorted, strictly encoded query string including `extra` parameters
fn canonical_query(url: &Url, extra: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k, true), uri_encode(&v, true)))
        .chain(
            extra
                .iter()
                .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true))),
        )
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}
