//! Shared plumbing for the JSON-over-POST service clients

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;

use crate::{Error, Result};

/// Raw response from one of the backing services
#[derive(Debug)]
pub(crate) struct ServiceResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ServiceResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Build the HTTP client shared by all service clients
///
/// # Errors
///
/// Returns error if the TLS backend cannot be initialized
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))
}

/// Reject blank service URLs up front
pub(crate) fn require_url(url: String, service: &str) -> Result<String> {
    if url.trim().is_empty() {
        return Err(Error::Config(format!("{service} URL is required")));
    }
    Ok(url)
}

/// Send a JSON body and collect status and body text
pub(crate) async fn send_json<T: Serialize + ?Sized + Sync>(
    request: reqwest::RequestBuilder,
    body: &T,
    service: &'static str,
) -> std::result::Result<ServiceResponse, reqwest::Error> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(service, error = %e, "request failed");
            e
        })?;

    let status = response.status();
    tracing::debug!(service, status = %status, "received response");

    let body = response.text().await?;
    if !status.is_success() {
        tracing::error!(service, status = %status, body = %body, "service error");
    }

    Ok(ServiceResponse { status, body })
}
