//! Configuration for the registry client and image reference parsing

use crate::error::{RegistryError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};

/// Docker Hub registry host
pub const DOCKER_HUB_HOST: &str = "index.docker.io";

/// Hosts that are aliases of [`DOCKER_HUB_HOST`]
const DOCKER_HUB_ALIASES: &[&str] = &["docker.io", "registry-1.docker.io", DOCKER_HUB_HOST];

pub const DEFAULT_TAG: &str = "latest";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub timeout: u64,
    pub skip_tls: bool,
    /// Talk plain http instead of https
    pub insecure: bool,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
            skip_tls: false,
            insecure: false,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.insecure { "http" } else { "https" }
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout == 0 {
            return Err(RegistryError::Configuration(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(RegistryError::Configuration(
                "User agent cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Value for the `Authorization` header of the first manifest request and
/// of the token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    /// Wrap a caller-supplied credential.
    ///
    /// A value that already names a scheme (`Basic ...`, `Bearer ...`) is kept
    /// verbatim. A bare value is the base64 `user:password` pair stored in the
    /// `auth` field of Docker's `config.json` and is sent as Basic.
    pub fn from_auth(auth: &str) -> Result<Self> {
        let auth = auth.trim();
        if auth.is_empty() {
            return Err(RegistryError::Configuration(
                "Authorization value cannot be empty".to_string(),
            ));
        }
        let value = if auth.contains(' ') {
            auth.to_string()
        } else {
            format!("Basic {}", auth)
        };
        HeaderValue::from_str(&value).map_err(|_| {
            RegistryError::Configuration(
                "Authorization value contains characters not allowed in an HTTP header"
                    .to_string(),
            )
        })?;
        Ok(Self(value))
    }

    pub fn basic(username: &str, password: &str) -> Result<Self> {
        if username.is_empty() {
            return Err(RegistryError::Configuration(
                "Username cannot be empty".to_string(),
            ));
        }
        let encoded = STANDARD.encode(format!("{}:{}", username, password));
        Ok(Self(format!("Basic {}", encoded)))
    }

    pub fn header_value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = self.0.split(' ').next().unwrap_or_default();
        write!(f, "Credentials({} <redacted>)", scheme)
    }
}

/// Map Docker Hub aliases onto the canonical API host
pub fn normalize_registry_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if is_docker_hub(host) {
        DOCKER_HUB_HOST.to_string()
    } else {
        host.to_string()
    }
}

pub fn is_docker_hub(host: &str) -> bool {
    DOCKER_HUB_ALIASES
        .iter()
        .any(|alias| alias.eq_ignore_ascii_case(host))
}

/// Official Docker Hub images live under `library/`
pub fn normalize_repository(host: &str, repository: &str) -> String {
    if is_docker_hub(host) && !repository.contains('/') {
        format!("library/{}", repository)
    } else {
        repository.to_string()
    }
}

/// `[host/]repository[:tag]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(RegistryError::Validation(
                "Image reference cannot be empty".to_string(),
            ));
        }
        if reference.contains("://") {
            return Err(RegistryError::Validation(format!(
                "Image reference must not include a scheme: {}",
                reference
            )));
        }
        if reference.contains('@') {
            return Err(RegistryError::Validation(format!(
                "Image reference is already pinned to a digest: {}",
                reference
            )));
        }

        let (registry, remaining) = match reference.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest)
            }
            _ => (DOCKER_HUB_HOST.to_string(), reference),
        };

        // A colon after the last slash separates the tag; earlier ones belong to a port
        let last_slash = remaining.rfind('/').map(|p| p + 1).unwrap_or(0);
        let (repository, tag) = match remaining[last_slash..].rfind(':') {
            Some(pos) => {
                let split = last_slash + pos;
                (&remaining[..split], &remaining[split + 1..])
            }
            None => (remaining, DEFAULT_TAG),
        };

        if repository.is_empty() {
            return Err(RegistryError::Validation(
                "Repository name cannot be empty".to_string(),
            ));
        }
        if tag.is_empty() {
            return Err(RegistryError::Validation(format!(
                "Tag cannot be empty in image reference: {}",
                reference
            )));
        }

        Ok(Self {
            registry: normalize_registry_host(&registry),
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}
