use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;

use super::{RemoteStore, BIBTEX_CONTENT_TYPE};
use crate::error::{LibraryError, Result};
use crate::settings::WebDavConfig;

/// Library file on a WebDAV server, accessed with HTTP basic auth
pub struct WebDavStore {
    client: Client,
    base_url: String,
    filename: String,
    username: String,
    password: String,
}

impl WebDavStore {
    pub fn new(config: &WebDavConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| LibraryError::RemoteUnavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(WebDavStore {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            filename: config.filename.trim_start_matches('/').to_string(),
            username: config.username.clone(),
            password: config.app_password.clone(),
        })
    }

    /// Full URL of the library file
    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url, self.filename)
    }

    fn check_status(&self, response: Response) -> Result<Response> {
        match response.status() {
            StatusCode::NOT_FOUND => Err(LibraryError::RemoteNotFound(self.filename.clone())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(LibraryError::RemoteUnavailable(
                format!("authentication failed for {}", self.url()),
            )),
            status if !status.is_success() => Err(LibraryError::RemoteUnavailable(format!(
                "server returned {} for {}",
                status,
                self.url()
            ))),
            _ => Ok(response),
        }
    }

    fn transport(&self, err: reqwest::Error) -> LibraryError {
        LibraryError::RemoteUnavailable(format!("request to {} failed: {}", self.url(), err))
    }
}

impl RemoteStore for WebDavStore {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn fetch(&self) -> Result<Vec<u8>> {
        log::debug!("GET {}", self.url());
        let response = self
            .client
            .get(self.url())
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .map_err(|e| self.transport(e))?;

        let response = self.check_status(response)?;
        let bytes = response.bytes().map_err(|e| self.transport(e))?;
        log::info!("Fetched {} bytes from {}", bytes.len(), self.url());
        Ok(bytes.to_vec())
    }

    fn store(&self, content: &[u8]) -> Result<()> {
        log::debug!("PUT {} ({} bytes)", self.url(), content.len());
        let response = self
            .client
            .put(self.url())
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, BIBTEX_CONTENT_TYPE)
            .body(content.to_vec())
            .send()
            .map_err(|e| self.transport(e))?;

        match self.check_status(response) {
            Ok(_) => {
                log::info!("Uploaded {} bytes to {}", content.len(), self.url());
                Ok(())
            }
            // A 404 on PUT means the parent collection is missing
            Err(LibraryError::RemoteNotFound(_)) => Err(LibraryError::RemoteUnavailable(format!(
                "collection for {} does not exist",
                self.url()
            ))),
            Err(e) => Err(e),
        }
    }

    fn exists(&self) -> Result<bool> {
        let response = self
            .client
            .head(self.url())
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .map_err(|e| self.transport(e))?;

        match self.check_status(response) {
            Ok(_) => Ok(true),
            Err(LibraryError::RemoteNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
