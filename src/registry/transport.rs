//! HTTP transport for registry lookups
//!
//! The client drives its lookup state machine over [`RegistryTransport`] so the
//! auth-upgrade flow can be exercised against a scripted transport in tests.
//! [`HttpTransport`] is the reqwest implementation used in production.

use crate::config::ClientConfig;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Media types accepted from the manifest endpoint
pub const MANIFEST_ACCEPT_TYPES: &[&str] = &[
    "application/vnd.docker.distribution.manifest.v2+json",
    "application/vnd.docker.distribution.manifest.list.v2+json",
    "application/vnd.oci.image.manifest.v1+json",
    "application/vnd.oci.image.index.v1+json",
];

/// Manifest HEAD request
#[derive(Debug, Clone)]
pub struct ManifestRequest {
    pub url: String,
    /// Full `Authorization` header value
    pub authorization: Option<String>,
}

/// Token service request
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub url: String,
    pub authorization: Option<String>,
}

/// Status, headers and body of a registry response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Header value as a string, ignoring values that are not visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// HEAD the manifest endpoint
    async fn head_manifest(&self, request: &ManifestRequest) -> Result<TransportResponse>;

    /// GET a token from the auth realm
    async fn fetch_token(&self, request: &TokenRequest) -> Result<TransportResponse>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    output: Logger,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig, output: Logger) -> Result<Self> {
        config.validate()?;

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(config.user_agent.clone());
        if config.skip_tls {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let client = builder.build().map_err(|e| {
            RegistryError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { client, output })
    }

    fn accept_header() -> String {
        MANIFEST_ACCEPT_TYPES.join(", ")
    }
}

#[async_trait]
impl RegistryTransport for HttpTransport {
    async fn head_manifest(&self, request: &ManifestRequest) -> Result<TransportResponse> {
        self.output.trace(&format!("HEAD {}", request.url));

        let mut req = self
            .client
            .head(&request.url)
            .header(ACCEPT, Self::accept_header());
        if let Some(authorization) = &request.authorization {
            req = req.header(AUTHORIZATION, authorization);
        }

        let response = req.send().await.map_err(|e| {
            RegistryError::Network(format!("Failed to request manifest {}: {}", request.url, e))
        })?;

        Ok(TransportResponse {
            status: response.status(),
            headers: response.headers().clone(),
            body: Vec::new(),
        })
    }

    async fn fetch_token(&self, request: &TokenRequest) -> Result<TransportResponse> {
        self.output.trace(&format!("GET {}", request.url));

        let mut req = self.client.get(&request.url);
        if let Some(authorization) = &request.authorization {
            req = req.header(AUTHORIZATION, authorization);
        }

        let response = req.send().await.map_err(|e| {
            RegistryError::Network(format!("Failed to request token from {}: {}", request.url, e))
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| RegistryError::Network(format!("Failed to read token response: {}", e)))?
            .to_vec();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
