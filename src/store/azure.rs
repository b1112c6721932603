//! Azure Blob Storage backend.
//!
//! Talks the Blob service REST API directly with a SAS token, which is all
//! this service needs: put/get/delete a blob, list by prefix, and a
//! container existence probe. Connection failures surface as
//! [`StoreError::Unavailable`] so resolution can fall through to the next
//! configured source.

use crate::config::StorageConfig;
use crate::store::{BlobStore, StoreError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AzureBlobStore {
    client: Client,
    container_url: String,
    sas_token: String,
}

impl AzureBlobStore {
    /// Build a store from storage settings.
    ///
    /// # Errors
    /// Fails when the account name is empty or the HTTP client cannot be
    /// constructed.
    pub fn new(config: &StorageConfig) -> Result<Self, StoreError> {
        if config.account.is_empty() {
            return Err(StoreError::Unavailable(
                "No storage account configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            container_url: format!(
                "https://{}.blob.core.windows.net/{}",
                config.account, config.container
            ),
            sas_token: config.sas_token.trim_start_matches('?').to_string(),
        })
    }

    fn blob_url(&self, key: &str) -> String {
        format!("{}/{}?{}", self.container_url, key, self.sas_token)
    }

    fn map_transport(e: reqwest::Error) -> StoreError {
        if e.is_connect() || e.is_timeout() {
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    fn name(&self) -> &'static str {
        "azure"
    }

    async fn container_exists(&self) -> Result<bool, StoreError> {
        let url = format!(
            "{}?restype=container&{}",
            self.container_url, self.sas_token
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_transport)?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::Http(format!(
                "Container probe returned {status}"
            ))),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        debug!(key, size = bytes.len(), "uploading blob");
        let response = self
            .client
            .put(self.blob_url(key))
            .header("x-ms-blob-type", "BlockBlob")
            .body(bytes)
            .send()
            .await
            .map_err(Self::map_transport)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::Http(format!(
                "Upload of '{key}' returned {}",
                response.status()
            )))
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let response = self
            .client
            .get(self.blob_url(key))
            .send()
            .await
            .map_err(Self::map_transport)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(key.to_string())),
            status if status.is_success() => {
                let bytes = response.bytes().await.map_err(Self::map_transport)?;
                Ok(bytes.to_vec())
            }
            status => Err(StoreError::Http(format!(
                "Download of '{key}' returned {status}"
            ))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let url = format!(
            "{}?restype=container&comp=list&prefix={}&{}",
            self.container_url,
            urlencode(prefix),
            self.sas_token
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_transport)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::Unavailable(
                "Container does not exist".to_string(),
            )),
            status if status.is_success() => {
                let body = response.text().await.map_err(Self::map_transport)?;
                Ok(parse_blob_names(&body))
            }
            status => Err(StoreError::Http(format!("List returned {status}"))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.blob_url(key))
            .send()
            .await
            .map_err(Self::map_transport)?;

        match response.status() {
            // Already gone counts as deleted
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => {
                warn!(key, %status, "blob delete failed");
                Err(StoreError::Http(format!(
                    "Delete of '{key}' returned {status}"
                )))
            }
        }
    }
}

/// Pull `<Name>` values out of a List Blobs XML response.
///
/// The response schema is stable and blob names cannot contain XML markup,
/// so tag scanning is sufficient here without an XML parser.
fn parse_blob_names(xml: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<Name>") {
        let after = &rest[start + "<Name>".len()..];
        if let Some(end) = after.find("</Name>") {
            names.push(decode_xml_entities(&after[..end]));
            rest = &after[end + "</Name>".len()..];
        } else {
            break;
        }
    }
    names
}

fn decode_xml_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
