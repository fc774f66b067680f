//! Scripted registry transport shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use registry_digest::error::Result;
use registry_digest::registry::{ManifestRequest, RegistryTransport, TokenRequest, TransportResponse};
use reqwest::StatusCode;
use reqwest::header::HeaderValue;
use std::collections::VecDeque;
use std::sync::Mutex;

pub const ALPINE_DIGEST: &str =
    "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
pub const BUSYBOX_DIGEST: &str =
    "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

pub const HUB_REALM: &str = "https://auth.docker.io/token";

/// Transport replaying canned responses in order and recording every request
#[derive(Default)]
pub struct ScriptedTransport {
    manifests: Mutex<VecDeque<TransportResponse>>,
    tokens: Mutex<VecDeque<TransportResponse>>,
    pub manifest_requests: Mutex<Vec<ManifestRequest>>,
    pub token_requests: Mutex<Vec<TokenRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifest(self, response: TransportResponse) -> Self {
        self.manifests.lock().unwrap().push_back(response);
        self
    }

    pub fn token(self, response: TransportResponse) -> Self {
        self.tokens.lock().unwrap().push_back(response);
        self
    }

    pub fn manifest_calls(&self) -> Vec<ManifestRequest> {
        self.manifest_requests.lock().unwrap().clone()
    }

    pub fn token_calls(&self) -> Vec<TokenRequest> {
        self.token_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryTransport for ScriptedTransport {
    async fn head_manifest(&self, request: &ManifestRequest) -> Result<TransportResponse> {
        self.manifest_requests.lock().unwrap().push(request.clone());
        Ok(self
            .manifests
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected manifest request"))
    }

    async fn fetch_token(&self, request: &TokenRequest) -> Result<TransportResponse> {
        self.token_requests.lock().unwrap().push(request.clone());
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected token request"))
    }
}

pub fn found(digest: &str) -> TransportResponse {
    let mut response = TransportResponse::new(StatusCode::OK);
    response
        .headers
        .insert("docker-content-digest", HeaderValue::from_str(digest).unwrap());
    response
}

pub fn status(code: u16) -> TransportResponse {
    TransportResponse::new(StatusCode::from_u16(code).unwrap())
}

pub fn challenge(repository: &str) -> TransportResponse {
    let mut response = status(401);
    let header = format!(
        r#"Bearer realm="{}",service="registry.docker.io",scope="repository:{}:pull""#,
        HUB_REALM, repository
    );
    response
        .headers
        .insert("www-authenticate", HeaderValue::from_str(&header).unwrap());
    response
}

pub fn basic_challenge() -> TransportResponse {
    let mut response = status(401);
    response.headers.insert(
        "www-authenticate",
        HeaderValue::from_static(r#"Basic realm="Registry Realm""#),
    );
    response
}

pub fn token_body(token: &str) -> TransportResponse {
    let mut response = status(200);
    response.body = serde_json::json!({ "token": token, "expires_in": 300 })
        .to_string()
        .into_bytes();
    response
}

/// JWT whose `access` claim lists `actions` on `repository`
pub fn jwt(repository: &str, actions: &[&str]) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let claims = serde_json::json!({
        "access": [{ "type": "repository", "name": repository, "actions": actions }]
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, payload)
}
