//! Azure Blob Storage container client.
//!
//! Blob and container operations go through `azure_storage_blobs`. The SDK
//! has no call for the blob service CORS rules, so Set Blob Service
//! Properties is sent with `reqwest` and signed in [`crate::auth`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use azure_core::error::ErrorKind;
use azure_core::StatusCode;
use azure_storage::{CloudLocation, ConnectionString};
use azure_storage_blobs::prelude::{ClientBuilder, ContainerClient, PublicAccess as AzureAccess};
use futures::StreamExt;
use reqwest::Url;
use tracing::{debug, info};

use crate::auth::{self, AzureCredential, SignableRequest, AZURE_API_VERSION};
use crate::container::{blob_url, BlobContainer, BlobInfo, CorsRule, PublicAccess};
use crate::error::{StorageError, StorageResult};
use crate::xml;

/// Default storage account and container name.
pub const DEFAULT_ACCOUNT: &str = "typespublisher";
pub const DEFAULT_CONTAINER: &str = "typespublisher";

/// Default HTTP request timeout for directly issued requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration for the Azure container client.
#[derive(Debug, Clone)]
pub struct AzureConfig {
    /// Storage account name
    pub account: String,
    /// Container name
    pub container: String,
    /// Request credential
    pub credential: AzureCredential,
    /// Blob service endpoint, e.g. `https://acct.blob.core.windows.net`
    /// or `http://127.0.0.1:10000/devstoreaccount1` for Azurite
    pub endpoint: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl AzureConfig {
    /// Create config from environment variables.
    ///
    /// Credentials are resolved in order from `AZURE_STORAGE_KEY`,
    /// `AZURE_STORAGE_CONNECTION_STRING` and `AZURE_STORAGE_SAS_TOKEN`.
    pub fn from_env() -> StorageResult<Self> {
        let connection_string = std::env::var("AZURE_STORAGE_CONNECTION_STRING").ok();
        let connection = connection_string
            .as_deref()
            .map(ConnectionString::new)
            .transpose()
            .map_err(|e| {
                StorageError::config_error(format!("Invalid storage connection string: {}", e))
            })?;

        let account = std::env::var("AZURE_STORAGE_ACCOUNT")
            .ok()
            .or_else(|| connection.as_ref().and_then(|c| c.account_name.map(str::to_string)))
            .unwrap_or_else(|| DEFAULT_ACCOUNT.to_string());

        let container = std::env::var("AZURE_STORAGE_CONTAINER")
            .unwrap_or_else(|_| DEFAULT_CONTAINER.to_string());

        let credential = if let Ok(key) = std::env::var("AZURE_STORAGE_KEY") {
            AzureCredential::shared_key(&key)?
        } else if let Some(key) = connection.as_ref().and_then(|c| c.account_key) {
            AzureCredential::shared_key(key)?
        } else if let Some(sas) = connection.as_ref().and_then(|c| c.sas) {
            AzureCredential::sas_token(sas)
        } else if let Ok(sas) = std::env::var("AZURE_STORAGE_SAS_TOKEN") {
            AzureCredential::sas_token(&sas)
        } else {
            return Err(StorageError::config_error(
                "No Azure credentials found. Set AZURE_STORAGE_KEY, \
                 AZURE_STORAGE_CONNECTION_STRING, or AZURE_STORAGE_SAS_TOKEN",
            ));
        };

        let endpoint = std::env::var("AZURE_BLOB_ENDPOINT")
            .ok()
            .or_else(|| {
                connection.as_ref().and_then(|c| {
                    connection_endpoint(&account, c.blob_endpoint, c.endpoint_suffix)
                })
            })
            .unwrap_or_else(|| default_endpoint(&account));

        let timeout = Duration::from_secs(
            std::env::var("AZURE_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        Ok(Self {
            account,
            container,
            credential,
            endpoint,
            timeout,
        })
    }
}

/// Public endpoint of a storage account.
pub fn default_endpoint(account: &str) -> String {
    format!("https://{}.blob.core.windows.net", account)
}

/// Blob endpoint described by a connection string, if any.
fn connection_endpoint(
    account: &str,
    blob_endpoint: Option<&str>,
    endpoint_suffix: Option<&str>,
) -> Option<String> {
    match (blob_endpoint, endpoint_suffix) {
        (Some(endpoint), _) => Some(endpoint.to_string()),
        (None, Some(suffix)) => Some(format!("https://{}.blob.{}", account, suffix)),
        (None, None) => None,
    }
}

/// Status code of a failed Azure SDK call, if the service answered.
fn response_status(error: &azure_core::Error) -> Option<StatusCode> {
    match error.kind() {
        ErrorKind::HttpResponse { status, .. } => Some(*status),
        _ => None,
    }
}

/// Azure Blob Storage container client.
#[derive(Clone)]
pub struct AzureContainer {
    client: ContainerClient,
    http: reqwest::Client,
    account: String,
    container: String,
    credential: AzureCredential,
    /// Endpoint without trailing slash.
    endpoint: String,
}

impl AzureContainer {
    /// Create a new client from configuration.
    pub fn new(config: AzureConfig) -> StorageResult<Self> {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        Url::parse(&endpoint).map_err(|e| {
            StorageError::config_error(format!("Invalid blob endpoint {}: {}", endpoint, e))
        })?;

        let credentials = config.credential.storage_credentials(&config.account)?;
        let location = CloudLocation::Custom {
            account: config.account.clone(),
            uri: endpoint.clone(),
        };
        let client =
            ClientBuilder::with_location(location, credentials).container_client(&config.container);

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                StorageError::config_error(format!("Failed to create HTTP client: {}", e))
            })?;

        info!(
            account = %config.account,
            container = %config.container,
            endpoint = %endpoint,
            "Azure container client initialized"
        );

        Ok(Self {
            client,
            http,
            account: config.account,
            container: config.container,
            credential: config.credential,
            endpoint,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::new(AzureConfig::from_env()?)
    }

    /// Container name.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// URL of the Set Blob Service Properties request.
    fn service_properties_url(&self) -> StorageResult<Url> {
        let mut url = format!("{}/?restype=service&comp=properties", self.endpoint);
        if let AzureCredential::SasToken(token) = &self.credential {
            url.push('&');
            url.push_str(token);
        }
        Url::parse(&url).map_err(|e| {
            StorageError::config_error(format!("Invalid service URL {}: {}", url, e))
        })
    }

    async fn put_blob(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        if name.is_empty() || name.starts_with('/') {
            return Err(StorageError::InvalidKey(name.to_string()));
        }

        let size = bytes.len();
        self.client
            .blob_client(name)
            .put_block_blob(bytes)
            .content_type(content_type.to_string())
            .await
            .map_err(|e| StorageError::upload_failed(format!("put blob {}: {}", name, e)))?;

        debug!(blob = %name, size = size, "Uploaded blob");
        Ok(())
    }
}

#[async_trait]
impl BlobContainer for AzureContainer {
    async fn ensure_created(&self, access: PublicAccess) -> StorageResult<()> {
        let azure_access = match access {
            PublicAccess::Private => AzureAccess::None,
            PublicAccess::Blob => AzureAccess::Blob,
            PublicAccess::Container => AzureAccess::Container,
        };

        match self.client.create().public_access(azure_access).await {
            Ok(_) => {
                info!(container = %self.container, ?access, "Created container");
                Ok(())
            }
            Err(e) if response_status(&e) == Some(StatusCode::Conflict) => {
                debug!(container = %self.container, "Container already exists");
                Ok(())
            }
            Err(e) => Err(StorageError::container_failed(format!(
                "create container {}: {}",
                self.container, e
            ))),
        }
    }

    async fn set_cors(&self, rules: &[CorsRule]) -> StorageResult<()> {
        let body = xml::cors_properties_body(rules);
        let url = self.service_properties_url()?;
        let date = auth::rfc1123_date(chrono::Utc::now());
        let ms_headers = [("x-ms-date", date.as_str()), ("x-ms-version", AZURE_API_VERSION)];
        let content_type = "application/xml";

        let mut request = self.http.put(url.clone());
        for (name, value) in &ms_headers {
            request = request.header(*name, *value);
        }

        if let AzureCredential::SharedKey(key) = &self.credential {
            let signable = SignableRequest {
                method: "PUT",
                content_length: body.len(),
                content_type,
                ms_headers: &ms_headers,
                path: url.path(),
                query: &[("restype", "service"), ("comp", "properties")],
            };
            request = request.header(
                "Authorization",
                auth::authorization_header(&self.account, key, &signable)?,
            );
        }

        debug!(url = %url.path(), "Setting blob service properties");
        let response = request
            .header("Content-Type", content_type)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::from_status(
                StorageError::ContainerFailed,
                "set service properties",
                status,
                &body,
            ));
        }

        debug!(rules = rules.len(), "Applied CORS rules");
        Ok(())
    }

    async fn create_blob_from_file(
        &self,
        name: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        let bytes = tokio::fs::read(path).await?;
        self.put_blob(name, bytes, content_type).await
    }

    async fn create_blob_from_text(
        &self,
        name: &str,
        text: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        self.put_blob(name, text.as_bytes().to_vec(), content_type)
            .await
    }

    async fn list_blobs(&self, prefix: &str) -> StorageResult<Vec<BlobInfo>> {
        debug!("Listing blobs with prefix: {}", prefix);

        let mut pages = self
            .client
            .list_blobs()
            .prefix(prefix.to_string())
            .into_stream();

        let mut blobs = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                StorageError::list_failed(format!("list blobs under {}: {}", prefix, e))
            })?;
            blobs.extend(page.blobs.blobs().map(|blob| BlobInfo {
                name: blob.name.clone(),
                size: blob.properties.content_length,
            }));
        }

        Ok(blobs)
    }

    async fn delete_blob(&self, name: &str) -> StorageResult<()> {
        debug!("Deleting {}", name);

        match self.client.blob_client(name).delete().await {
            Ok(_) => Ok(()),
            Err(e) if response_status(&e) == Some(StatusCode::NotFound) => {
                debug!(blob = %name, "Blob already deleted");
                Ok(())
            }
            Err(e) => Err(StorageError::delete_failed(format!(
                "delete blob {}: {}",
                name, e
            ))),
        }
    }

    fn url_of_blob(&self, name: &str) -> String {
        blob_url(&format!("{}/{}", self.endpoint, self.container), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{
        body_string_contains, header, header_exists, header_regex, method, path, query_param,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn container(endpoint: &str, credential: AzureCredential) -> AzureContainer {
        AzureContainer::new(AzureConfig {
            account: "acct".to_string(),
            container: "pub".to_string(),
            credential,
            endpoint: endpoint.to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn shared_key() -> AzureCredential {
        AzureCredential::shared_key("c2VjcmV0").unwrap()
    }

    #[test]
    fn test_url_of_blob() {
        let c = container(&default_endpoint("acct"), shared_key());
        assert_eq!(
            c.url_of_blob("data/a.json"),
            "https://acct.blob.core.windows.net/pub/data/a.json"
        );
        assert_eq!(
            c.url_of_blob("index.html"),
            "https://acct.blob.core.windows.net/pub/index.html"
        );
    }

    #[test]
    fn test_url_of_blob_is_encoded() {
        let c = container("https://acct.blob.core.windows.net/", shared_key());
        assert_eq!(
            c.url_of_blob("data/a b#1.json"),
            "https://acct.blob.core.windows.net/pub/data/a%20b%231.json"
        );
        assert!(Url::parse(&c.url_of_blob("logs/ü/x.md")).is_ok());
    }

    #[test]
    fn test_emulator_endpoint() {
        let c = container("http://127.0.0.1:10000/devstoreaccount1", shared_key());
        assert_eq!(
            c.url_of_blob("index.html"),
            "http://127.0.0.1:10000/devstoreaccount1/pub/index.html"
        );
        assert_eq!(c.service_properties_url().unwrap().path(), "/devstoreaccount1/");
    }

    #[test]
    fn test_service_properties_url_appends_sas() {
        let c = container(
            &default_endpoint("acct"),
            AzureCredential::sas_token("?sv=2023-11-03&sig=x"),
        );
        assert_eq!(
            c.service_properties_url().unwrap().as_str(),
            "https://acct.blob.core.windows.net/?restype=service&comp=properties\
             &sv=2023-11-03&sig=x"
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = AzureContainer::new(AzureConfig {
            account: "acct".to_string(),
            container: "pub".to_string(),
            credential: shared_key(),
            endpoint: "not a url".to_string(),
            timeout: Duration::from_secs(5),
        });
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[test]
    fn test_connection_endpoint() {
        assert_eq!(
            connection_endpoint("acct", None, Some("core.windows.net")).as_deref(),
            Some("https://acct.blob.core.windows.net")
        );
        assert_eq!(
            connection_endpoint(
                "devstoreaccount1",
                Some("http://127.0.0.1:10000/devstoreaccount1"),
                Some("core.windows.net"),
            )
            .as_deref(),
            Some("http://127.0.0.1:10000/devstoreaccount1")
        );
        assert_eq!(connection_endpoint("x", None, None), None);
    }

    #[tokio::test]
    async fn test_existing_container_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/pub"))
            .and(query_param("restype", "container"))
            .and(header("x-ms-blob-public-access", "blob"))
            .respond_with(ResponseTemplate::new(409))
            .expect(1)
            .mount(&server)
            .await;

        let c = container(&server.uri(), shared_key());
        c.ensure_created(PublicAccess::Blob).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_container_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/pub"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let c = container(&server.uri(), shared_key());
        let result = c.ensure_created(PublicAccess::Blob).await;
        assert!(matches!(result, Err(StorageError::ContainerFailed(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_blob_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/pub/logs/2020-01-01T00-00-00.000Z/upload-blobs.md"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let c = container(&server.uri(), shared_key());
        c.delete_blob("logs/2020-01-01T00-00-00.000Z/upload-blobs.md")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let c = container(&server.uri(), shared_key());
        let result = c.delete_blob("logs/a/b.md").await;
        assert!(matches!(result, Err(StorageError::DeleteFailed(_))));
    }

    #[tokio::test]
    async fn test_upload_sends_encoded_block_blob() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/pub/data/a%20b.json"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .and(header_regex("authorization", "^SharedKey acct:"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let c = container(&server.uri(), shared_key());
        let result = c
            .create_blob_from_text("data/a b.json", "[]", "application/json")
            .await;
        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
    }

    #[tokio::test]
    async fn test_upload_rejects_invalid_name() {
        let server = MockServer::start().await;
        let c = container(&server.uri(), shared_key());

        let result = c.create_blob_from_text("/abs", "x", "text/plain").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pub"))
            .and(query_param("restype", "container"))
            .and(query_param("comp", "list"))
            .and(query_param("prefix", "logs/"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let c = container(&server.uri(), shared_key());
        let result = c.list_blobs("logs/").await;
        assert!(matches!(result, Err(StorageError::ListFailed(_))));
    }

    #[tokio::test]
    async fn test_set_cors_with_shared_key() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/"))
            .and(query_param("restype", "service"))
            .and(query_param("comp", "properties"))
            .and(header("x-ms-version", AZURE_API_VERSION))
            .and(header_exists("x-ms-date"))
            .and(header("content-type", "application/xml"))
            .and(header_regex("authorization", "^SharedKey acct:[A-Za-z0-9+/]{43}=$"))
            .and(body_string_contains("<AllowedOrigins>*</AllowedOrigins>"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let c = container(&server.uri(), shared_key());
        c.set_cors(&[CorsRule::public_read()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_cors_with_sas_token() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/"))
            .and(query_param("comp", "properties"))
            .and(query_param("sv", "2023-11-03"))
            .and(query_param("sig", "x"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let c = container(&server.uri(), AzureCredential::sas_token("sv=2023-11-03&sig=x"));
        c.set_cors(&[CorsRule::public_read()]).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0]
            .headers
            .iter()
            .any(|(name, _)| name.as_str().eq_ignore_ascii_case("authorization")));
    }

    #[tokio::test]
    async fn test_set_cors_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(400).set_body_string("InvalidXmlDocument"))
            .mount(&server)
            .await;

        let c = container(&server.uri(), shared_key());
        let result = c.set_cors(&[CorsRule::public_read()]).await;
        match result {
            Err(StorageError::ContainerFailed(msg)) => assert!(msg.contains("InvalidXmlDocument")),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
