//! Registry client resolving image tags to manifest digests
//!
//! Each lookup runs a small state machine:
//!
//! ```text
//! RequestUnauth -> Success
//!               -> NeedAuth -> RequestAuth -> Success | Fail
//!               -> Fail
//! ```
//!
//! `RequestAuth` never transitions back to `NeedAuth`, so a lookup upgrades
//! its authorization at most once.

use crate::config::{ClientConfig, Credentials, normalize_registry_host, normalize_repository};
use crate::digest::Digest;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::auth::{self, BearerChallenge, BearerToken};
use crate::registry::transport::{
    HttpTransport, ManifestRequest, RegistryTransport, TransportResponse,
};
use reqwest::StatusCode;
use std::sync::Arc;

pub const DIGEST_HEADER: &str = "docker-content-digest";
pub const CHALLENGE_HEADER: &str = "www-authenticate";

/// Builder for [`RegistryClient`]
pub struct RegistryClientBuilder {
    host: String,
    auth: Option<Credentials>,
    config: ClientConfig,
    output: Logger,
    transport: Option<Arc<dyn RegistryTransport>>,
}

impl RegistryClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            auth: None,
            config: ClientConfig::default(),
            output: Logger::default(),
            transport: None,
        }
    }

    pub fn with_auth(mut self, auth: Option<Credentials>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_logger(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    /// Replace the reqwest transport, e.g. with a scripted one in tests
    pub fn with_transport(mut self, transport: Arc<dyn RegistryTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        let host = normalize_registry_host(&self.host);
        if host.is_empty() {
            return Err(RegistryError::Validation(
                "Registry host cannot be empty".to_string(),
            ));
        }
        if host.contains("://") || host.contains('/') {
            return Err(RegistryError::Validation(format!(
                "Registry host must be a bare hostname: {}",
                host
            )));
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config, self.output.clone())?),
        };

        Ok(RegistryClient {
            host,
            scheme: self.config.scheme(),
            auth: self.auth,
            transport,
            output: self.output,
        })
    }
}

/// Client bound to one registry host
#[derive(Clone)]
pub struct RegistryClient {
    host: String,
    scheme: &'static str,
    auth: Option<Credentials>,
    transport: Arc<dyn RegistryTransport>,
    output: Logger,
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("host", &self.host)
            .field("scheme", &self.scheme)
            .field("auth", &self.auth)
            .finish()
    }
}

enum LookupState {
    RequestUnauth,
    NeedAuth(BearerChallenge),
    RequestAuth(BearerToken),
}

/// How a manifest response is interpreted
enum Outcome {
    Found(Digest),
    NotFound,
    Unauthorized,
    Forbidden,
    Other(StatusCode),
}

impl RegistryClient {
    /// Client for `host` using an optional credential on the first attempt
    pub fn new(host: &str, auth: Option<&str>) -> Result<Self> {
        let auth = auth.map(Credentials::from_auth).transpose()?;
        RegistryClientBuilder::new(host).with_auth(auth).build()
    }

    pub fn builder(host: impl Into<String>) -> RegistryClientBuilder {
        RegistryClientBuilder::new(host)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn manifest_url(&self, repository: &str, tag: &str) -> String {
        format!(
            "{}://{}/v2/{}/manifests/{}",
            self.scheme, self.host, repository, tag
        )
    }

    /// Resolve `repository:tag` to the digest of its manifest
    pub async fn get_image_digest(&self, repository: &str, tag: &str) -> Result<Digest> {
        let repository = repository.trim().trim_matches('/');
        let tag = tag.trim();
        if repository.is_empty() {
            return Err(RegistryError::Validation(
                "Repository name cannot be empty".to_string(),
            ));
        }
        if tag.is_empty() {
            return Err(RegistryError::Validation("Tag cannot be empty".to_string()));
        }

        let repository = normalize_repository(&self.host, repository);
        let url = self.manifest_url(&repository, tag);
        let not_found = || RegistryError::ImageNotFound {
            repository: repository.clone(),
            tag: tag.to_string(),
        };

        self.output
            .detail(&format!("Resolving digest for {}/{}:{}", self.host, repository, tag));

        let mut state = LookupState::RequestUnauth;
        loop {
            state = match state {
                LookupState::RequestUnauth => {
                    let authorization = self.auth.as_ref().map(|c| c.header_value().to_string());
                    let response = self.request_manifest(&url, authorization).await?;

                    match Self::classify(&response)? {
                        Outcome::Found(digest) => return Ok(self.found(digest)),
                        Outcome::NotFound => return Err(not_found()),
                        Outcome::Unauthorized => {
                            let challenge = response
                                .header(CHALLENGE_HEADER)
                                .and_then(BearerChallenge::parse)
                                .ok_or_else(|| {
                                    RegistryError::Authorization(format!(
                                        "Registry {} requires authorization but offered no bearer challenge",
                                        self.host
                                    ))
                                })?;
                            self.output.debug(&format!(
                                "Bearer challenge: realm={}, service={:?}, scope={:?}",
                                challenge.realm, challenge.service, challenge.scope
                            ));
                            LookupState::NeedAuth(challenge)
                        }
                        Outcome::Forbidden => {
                            return Err(RegistryError::Authorization(format!(
                                "Access to {} denied by {}",
                                repository, self.host
                            )));
                        }
                        Outcome::Other(status) => {
                            return Err(RegistryError::UnexpectedStatus {
                                status: status.as_u16(),
                                url,
                            });
                        }
                    }
                }
                LookupState::NeedAuth(challenge) => {
                    let token = auth::fetch_token(
                        self.transport.as_ref(),
                        &challenge,
                        &repository,
                        self.auth.as_ref().map(Credentials::header_value),
                        &self.output,
                    )
                    .await?;
                    LookupState::RequestAuth(token)
                }
                LookupState::RequestAuth(token) => {
                    let authorization = format!("Bearer {}", token.value);
                    let response = self.request_manifest(&url, Some(authorization)).await?;

                    return match Self::classify(&response)? {
                        Outcome::Found(digest) => Ok(self.found(digest)),
                        Outcome::NotFound => Err(not_found()),
                        Outcome::Unauthorized | Outcome::Forbidden => {
                            // Registries hide repositories the anonymous token holds no grant on
                            if !token.authenticated
                                && token.grants(&repository, "pull") == Some(false)
                            {
                                self.output.debug(
                                    "Anonymous token grants no pull access; treating as not found",
                                );
                                Err(not_found())
                            } else {
                                Err(RegistryError::Authorization(format!(
                                    "Registry {} rejected the bearer token for {} with status {}",
                                    self.host, repository, response.status
                                )))
                            }
                        }
                        Outcome::Other(status) => Err(RegistryError::UnexpectedStatus {
                            status: status.as_u16(),
                            url,
                        }),
                    };
                }
            };
        }
    }

    async fn request_manifest(
        &self,
        url: &str,
        authorization: Option<String>,
    ) -> Result<TransportResponse> {
        let request = ManifestRequest {
            url: url.to_string(),
            authorization,
        };
        let response = self.transport.head_manifest(&request).await?;
        self.output
            .detail(&format!("Manifest response status: {}", response.status));
        Ok(response)
    }

    fn classify(response: &TransportResponse) -> Result<Outcome> {
        let status = response.status;
        if status.is_success() {
            let value = response.header(DIGEST_HEADER).ok_or_else(|| {
                RegistryError::Parse(format!(
                    "Registry response ({}) is missing the Docker-Content-Digest header",
                    status
                ))
            })?;
            return Ok(Outcome::Found(Digest::parse(value)?));
        }

        Ok(match status {
            StatusCode::NOT_FOUND => Outcome::NotFound,
            StatusCode::UNAUTHORIZED => Outcome::Unauthorized,
            StatusCode::FORBIDDEN => Outcome::Forbidden,
            other => Outcome::Other(other),
        })
    }

    fn found(&self, digest: Digest) -> Digest {
        self.output.detail(&format!("Resolved digest {}", digest));
        digest
    }
}
