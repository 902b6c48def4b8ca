//! Azure request authentication.
//!
//! Blob operations go through the Azure SDK, which is handed
//! [`StorageCredentials`]. The Set Blob Service Properties request is sent
//! directly and authorised here, either with a Shared Key signature or with a
//! SAS token appended to the query string.

use azure_storage::StorageCredentials;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{StorageError, StorageResult};

/// REST API version sent with directly issued requests.
pub const AZURE_API_VERSION: &str = "2023-11-03";

/// Credential used to authorise requests.
#[derive(Clone)]
pub enum AzureCredential {
    /// Base64 storage account key, validated on construction.
    SharedKey(String),
    /// SAS token without the leading `?`.
    SasToken(String),
}

impl AzureCredential {
    /// Build a Shared Key credential from the base64 account key.
    pub fn shared_key(encoded: &str) -> StorageResult<Self> {
        let encoded = encoded.trim();
        STANDARD.decode(encoded).map_err(|e| {
            StorageError::config_error(format!("Account key is not valid base64: {}", e))
        })?;
        Ok(Self::SharedKey(encoded.to_string()))
    }

    /// Build a SAS credential, stripping a leading `?` if present.
    pub fn sas_token(token: &str) -> Self {
        let token = token.trim();
        Self::SasToken(token.strip_prefix('?').unwrap_or(token).to_string())
    }

    /// Credentials for the Azure SDK clients.
    pub fn storage_credentials(&self, account: &str) -> StorageResult<StorageCredentials> {
        match self {
            AzureCredential::SharedKey(key) => Ok(StorageCredentials::access_key(
                account.to_string(),
                key.clone(),
            )),
            AzureCredential::SasToken(token) => StorageCredentials::sas_token(token.as_str())
                .map_err(|e| StorageError::config_error(format!("Invalid SAS token: {}", e))),
        }
    }
}

impl std::fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AzureCredential::SharedKey(_) => f.write_str("SharedKey(..)"),
            AzureCredential::SasToken(_) => f.write_str("SasToken(..)"),
        }
    }
}

/// The parts of a request covered by a Shared Key signature.
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub content_length: usize,
    pub content_type: &'a str,
    /// `x-ms-*` headers, including `x-ms-date` and `x-ms-version`.
    pub ms_headers: &'a [(&'a str, &'a str)],
    /// URL path exactly as sent, percent-encoded, starting with `/`.
    pub path: &'a str,
    /// Unencoded query parameters.
    pub query: &'a [(&'a str, &'a str)],
}

/// Format a timestamp for the `x-ms-date` header (RFC 1123).
pub fn rfc1123_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Build the Shared Key string-to-sign for a request.
pub fn string_to_sign(account: &str, request: &SignableRequest<'_>) -> String {
    // Content-Length is empty for zero-length bodies.
    let content_length = match request.content_length {
        0 => String::new(),
        n => n.to_string(),
    };

    let mut headers: Vec<(String, &str)> = request
        .ms_headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.trim()))
        .filter(|(k, _)| k.starts_with("x-ms-"))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let mut canonical_headers = String::new();
    for (name, value) in &headers {
        canonical_headers.push_str(&format!("{}:{}\n", name, value));
    }

    let mut canonical_resource = format!("/{}{}", account, request.path);
    let mut query: Vec<(String, &str)> = request
        .query
        .iter()
        .map(|(k, v)| (k.to_lowercase(), *v))
        .collect();
    query.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, value) in &query {
        canonical_resource.push_str(&format!("\n{}:{}", name, value));
    }

    // VERB, Content-Encoding, Content-Language, Content-Length, Content-MD5,
    // Content-Type, Date, If-Modified-Since, If-Match, If-None-Match,
    // If-Unmodified-Since, Range, then headers and resource.
    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
        request.method,
        content_length,
        request.content_type,
        canonical_headers,
        canonical_resource
    )
}

/// Compute the `Authorization` header value for a request.
pub fn authorization_header(
    account: &str,
    encoded_key: &str,
    request: &SignableRequest<'_>,
) -> StorageResult<String> {
    type HmacSha256 = Hmac<Sha256>;

    let key = STANDARD
        .decode(encoded_key)
        .map_err(|e| StorageError::config_error(format!("Invalid account key: {}", e)))?;
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| StorageError::config_error(format!("Invalid HMAC key: {}", e)))?;
    mac.update(string_to_sign(account, request).as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!("SharedKey {}:{}", account, signature))
}
