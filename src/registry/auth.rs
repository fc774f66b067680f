//! Bearer-token authentication for Docker registry access
//!
//! A registry answering 401 advertises its token service in the
//! `WWW-Authenticate` header: `Bearer realm="...",service="...",scope="..."`.
//! The token fetched from that realm is sent back as `Authorization: Bearer`.

use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::transport::{RegistryTransport, TokenRequest};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

/// Parsed bearer challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Token issued by the realm
#[derive(Clone)]
pub struct BearerToken {
    pub value: String,
    /// Whether credentials were presented to the token service
    pub authenticated: bool,
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("len", &self.value.len())
            .field("authenticated", &self.authenticated)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    access: Vec<AccessEntry>,
}

#[derive(Debug, Deserialize)]
struct AccessEntry {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    #[serde(default)]
    actions: Vec<String>,
}

/// Default scope for a pull-only lookup
pub fn pull_scope(repository: &str) -> String {
    format!("repository:{}:pull", repository)
}

impl BearerChallenge {
    /// Parse a `WWW-Authenticate` value; `None` unless it is a Bearer challenge with a realm
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let params = parse_auth_params(params);
        let realm = params.get("realm").filter(|r| !r.is_empty())?.clone();

        Some(Self {
            realm,
            service: params.get("service").cloned(),
            scope: params.get("scope").cloned(),
        })
    }

    /// Token endpoint URL with `service` and `scope` query parameters
    pub fn token_url(&self, default_scope: &str) -> Result<Url> {
        let mut url = Url::parse(&self.realm).map_err(|e| {
            RegistryError::Authorization(format!("Invalid auth realm {}: {}", self.realm, e))
        })?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(service) = &self.service {
                query.append_pair("service", service);
            }
            query.append_pair("scope", self.scope.as_deref().unwrap_or(default_scope));
        }
        Ok(url)
    }
}

/// Split `key="value",key=value` pairs, honouring commas inside quotes
fn parse_auth_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if *c == ',' || c.is_whitespace()) {
            chars.next();
        }

        let key: String = chars.by_ref().take_while(|c| *c != '=').collect();
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            break;
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.peek() {
                if *c == ',' {
                    break;
                }
                value.push(*c);
                chars.next();
            }
            value = value.trim().to_string();
        }

        params.insert(key, value);
    }

    params
}

/// Exchange a challenge for a bearer token
pub async fn fetch_token(
    transport: &dyn RegistryTransport,
    challenge: &BearerChallenge,
    repository: &str,
    authorization: Option<&str>,
    output: &Logger,
) -> Result<BearerToken> {
    let url = challenge.token_url(&pull_scope(repository))?;
    output.detail(&format!(
        "Requesting {} token from {}",
        if authorization.is_some() { "authenticated" } else { "anonymous" },
        url
    ));

    let request = TokenRequest {
        url: url.to_string(),
        authorization: authorization.map(str::to_string),
    };
    let response = transport.fetch_token(&request).await?;
    let status = response.status;

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(RegistryError::Authorization(format!(
            "Token service {} rejected the credentials with status {}",
            challenge.realm, status
        )));
    }
    if !status.is_success() {
        return Err(RegistryError::Authorization(format!(
            "Token request to {} failed with status {}",
            challenge.realm, status
        )));
    }

    let body: TokenResponse = serde_json::from_slice(&response.body)
        .map_err(|e| RegistryError::Parse(format!("Failed to parse token response: {}", e)))?;
    let value = body
        .token
        .or(body.access_token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            RegistryError::Authorization("Token response did not contain a token".to_string())
        })?;

    output.detail(&format!("Token obtained (length: {} chars)", value.len()));

    Ok(BearerToken {
        value,
        authenticated: authorization.is_some(),
    })
}

impl BearerToken {
    /// Whether the token's JWT `access` claim grants `action` on `repository`.
    ///
    /// `None` when the token is not a JWT or carries no readable claims.
    pub fn grants(&self, repository: &str, action: &str) -> Option<bool> {
        let payload = self.value.split('.').nth(1)?;
        let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: TokenClaims = serde_json::from_slice(&decoded).ok()?;

        Some(claims.access.iter().any(|entry| {
            entry.kind == "repository"
                && entry.name == repository
                && entry.actions.iter().any(|a| a == action || a == "*")
        }))
    }
}
