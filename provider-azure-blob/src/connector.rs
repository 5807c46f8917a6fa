//! Azure Blob Storage connector implementation
//!
//! Implements the `StorageProvider` trait on top of the `List Blobs` REST call.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::storage::{RemoteFile, StorageProvider};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::AzureBlobError;
use crate::types::{BlobItem, EnumerationResults};

/// REST API version sent with every request
const API_VERSION: &str = "2021-08-06";

/// Maximum results per page (Azure limit)
const MAX_PAGE_SIZE: u32 = 5000;

/// Azure Blob Storage connector
///
/// Lists a single container using a SAS token for authentication.
///
/// # Example
///
/// ```ignore
/// use provider_azure_blob::AzureBlobConnector;
/// use bridge_traits::storage::StorageProvider;
///
/// let connector = AzureBlobConnector::new(
///     http_client,
///     "https://acct.blob.core.windows.net/recordings",
///     "sv=2022-11-02&ss=b&sig=...",
/// )?;
/// let (files, next_cursor) = connector.list_objects(None).await?;
/// ```
pub struct AzureBlobConnector {
    http_client: Arc<dyn HttpClient>,

    /// Container URL without query string or trailing slash
    container_url: String,

    /// Last path segment of the container URL
    container_name: String,

    /// SAS query string without the leading `?`
    sas_token: String,

    retry_policy: RetryPolicy,
}

impl AzureBlobConnector {
    /// Create a new connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `container_url` - `https://<account>.blob.core.windows.net/<container>`
    /// * `sas_token` - shared access signature with `list` permission
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        container_url: &str,
        sas_token: &str,
    ) -> crate::error::Result<Self> {
        let trimmed = container_url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed)
            .map_err(|e| AzureBlobError::InvalidContainerUrl(format!("{}: {}", trimmed, e)))?;

        let container_name = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string)
            .ok_or_else(|| {
                AzureBlobError::InvalidContainerUrl(format!(
                    "{}: missing container path segment",
                    trimmed
                ))
            })?;

        Ok(Self {
            http_client,
            container_url: trimmed.to_string(),
            container_name,
            sas_token: sas_token.trim().trim_start_matches('?').to_string(),
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Override the retry policy used for listing calls
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn list_url(&self, cursor: Option<&str>) -> String {
        let mut url = format!(
            "{}?restype=container&comp=list&maxresults={}",
            self.container_url, MAX_PAGE_SIZE
        );

        if let Some(marker) = cursor {
            url.push_str(&format!("&marker={}", urlencoding::encode(marker)));
        }

        if !self.sas_token.is_empty() {
            url.push('&');
            url.push_str(&self.sas_token);
        }

        url
    }

    fn convert_blob(blob: BlobItem) -> RemoteFile {
        RemoteFile::new(blob.name)
    }

    fn check_status(response: &HttpResponse) -> crate::error::Result<()> {
        if response.is_success() {
            return Ok(());
        }

        let message = response
            .header("x-ms-error-code")
            .map(str::to_string)
            .unwrap_or_else(|| String::from_utf8_lossy(&response.body).trim().to_string());

        warn!(status = response.status, error_code = %message, "Listing request rejected");

        if response.status == 401 || response.status == 403 {
            Err(AzureBlobError::AuthenticationFailed {
                status_code: response.status,
                message,
            })
        } else {
            Err(AzureBlobError::ApiError {
                status_code: response.status,
                message,
            })
        }
    }

    async fn fetch_page(
        &self,
        cursor: Option<String>,
    ) -> crate::error::Result<(Vec<RemoteFile>, Option<String>)> {
        let request = HttpRequest::get(self.list_url(cursor.as_deref()))
            .header("x-ms-version", API_VERSION)
            .header("Accept", "application/xml")
            .timeout(Duration::from_secs(60));

        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        Self::check_status(&response)?;

        let body = response.text()?;
        let page = EnumerationResults::from_xml(&body)?;
        let next_cursor = page.continuation();

        let files: Vec<RemoteFile> = page
            .blobs
            .items
            .into_iter()
            .map(Self::convert_blob)
            .collect();

        Ok((files, next_cursor))
    }
}

#[async_trait]
impl StorageProvider for AzureBlobConnector {
    #[instrument(skip(self), fields(container = %self.container_name))]
    async fn list_objects(&self, cursor: Option<String>) -> Result<(Vec<RemoteFile>, Option<String>)> {
        debug!(has_cursor = cursor.is_some(), "Listing blob page");

        let (files, next_cursor) = self.fetch_page(cursor).await?;

        info!(
            count = files.len(),
            has_more = next_cursor.is_some(),
            "Listed blob page"
        );

        Ok((files, next_cursor))
    }

    fn container_name(&self) -> &str {
        &self.container_name
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.container_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::HttpResponse;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
            async fn execute_with_retry(&self, request: HttpRequest, policy: RetryPolicy) -> Result<HttpResponse>;
        }
    }

    const URL: &str = "https://acct.blob.core.windows.net/recordings";

    fn xml_response(status: u16, body: &str) -> Result<HttpResponse> {
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        })
    }

    #[test]
    fn test_container_name_from_url() {
        let http = Arc::new(MockHttpClient::new());
        let connector = AzureBlobConnector::new(http, "https://acct.blob.core.windows.net/recordings/", "?sv=1&sig=x").unwrap();

        assert_eq!(connector.container_name(), "recordings");
        assert_eq!(
            connector.object_url("a/1.wav"),
            "https://acct.blob.core.windows.net/recordings/a/1.wav"
        );
    }

    #[test]
    fn test_rejects_url_without_container() {
        let http = Arc::new(MockHttpClient::new());
        let result = AzureBlobConnector::new(http, "https://acct.blob.core.windows.net", "sig=x");

        assert!(matches!(result, Err(AzureBlobError::InvalidContainerUrl(_))));
    }

    #[test]
    fn test_list_url_includes_marker_and_sas() {
        let http = Arc::new(MockHttpClient::new());
        let connector = AzureBlobConnector::new(http, URL, "?sv=1&sig=abc").unwrap();

        assert_eq!(
            connector.list_url(None),
            format!("{}?restype=container&comp=list&maxresults=5000&sv=1&sig=abc", URL)
        );
        assert_eq!(
            connector.list_url(Some("2!a b")),
            format!(
                "{}?restype=container&comp=list&maxresults=5000&marker=2%21a%20b&sv=1&sig=abc",
                URL
            )
        );
    }

    #[tokio::test]
    async fn test_list_objects_success() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute_with_retry()
            .times(1)
            .withf(|request, _| {
                request.url.contains("comp=list")
                    && !request.url.contains("marker=")
                    && request.headers.get("x-ms-version") == Some(&API_VERSION.to_string())
            })
            .returning(|_, _| {
                xml_response(
                    200,
                    "<EnumerationResults><Blobs>\
                       <Blob><Name>a/1.wav</Name><Properties><Content-Length>10</Content-Length></Properties></Blob>\
                       <Blob><Name>a/1.txt</Name></Blob>\
                     </Blobs><NextMarker>page-2</NextMarker></EnumerationResults>",
                )
            });

        let connector = AzureBlobConnector::new(Arc::new(mock_http), URL, "sig=x").unwrap();
        let (files, cursor) = connector.list_objects(None).await.unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].key, "a/1.wav");
        assert_eq!(files[1].key, "a/1.txt");
        assert_eq!(cursor, Some("page-2".to_string()));
    }

    #[tokio::test]
    async fn test_list_objects_last_page() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute_with_retry()
            .times(1)
            .withf(|request, _| request.url.contains("marker=page-2"))
            .returning(|_, _| {
                xml_response(
                    200,
                    "<EnumerationResults><Blobs><Blob><Name>b.wav</Name></Blob></Blobs><NextMarker /></EnumerationResults>",
                )
            });

        let connector = AzureBlobConnector::new(Arc::new(mock_http), URL, "sig=x").unwrap();
        let (files, cursor) = connector
            .list_objects(Some("page-2".to_string()))
            .await
            .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(cursor, None);
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_authentication_failure() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute_with_retry().times(1).returning(|_, _| {
            let mut headers = HashMap::new();
            headers.insert(
                "x-ms-error-code".to_string(),
                "AuthenticationFailed".to_string(),
            );
            Ok(HttpResponse {
                status: 403,
                headers,
                body: Bytes::new(),
            })
        });

        let connector = AzureBlobConnector::new(Arc::new(mock_http), URL, "sig=bad").unwrap();
        let err = connector.list_objects(None).await.unwrap_err();

        match err {
            BridgeError::OperationFailed(msg) => {
                assert!(msg.contains("Authentication failed"));
                assert!(msg.contains("AuthenticationFailed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|_, _| Err(BridgeError::OperationFailed("Connection failed".to_string())));

        let connector = AzureBlobConnector::new(Arc::new(mock_http), URL, "sig=x").unwrap();
        let err = connector.list_objects(None).await.unwrap_err();

        assert!(matches!(err, BridgeError::OperationFailed(m) if m == "Connection failed"));
    }
}
