mod common;

use common::*;
use registry_digest::registry::RegistryTransport;
use registry_digest::{ClientConfig, Credentials, RegistryClient, RegistryError};
use std::sync::Arc;

fn client_with(transport: Arc<ScriptedTransport>, auth: Option<&str>) -> RegistryClient {
    let auth = auth.map(|a| Credentials::from_auth(a).unwrap());
    RegistryClient::builder("index.docker.io")
        .with_auth(auth)
        .with_transport(transport as Arc<dyn RegistryTransport>)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_direct_hit_needs_no_token() {
    let transport = Arc::new(ScriptedTransport::new().manifest(found(ALPINE_DIGEST)));
    let client = client_with(transport.clone(), None);

    let digest = client.get_image_digest("alpine", "latest").await.unwrap();
    assert_eq!(digest.as_str(), ALPINE_DIGEST);

    let calls = transport.manifest_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].url,
        "https://index.docker.io/v2/library/alpine/manifests/latest"
    );
    assert!(calls[0].authorization.is_none());
    assert!(transport.token_calls().is_empty());
}

#[tokio::test]
async fn test_challenge_upgrades_to_bearer_once() {
    let token = jwt("library/alpine", &["pull"]);
    let transport = Arc::new(
        ScriptedTransport::new()
            .manifest(challenge("library/alpine"))
            .token(token_body(&token))
            .manifest(found(ALPINE_DIGEST)),
    );
    let client = client_with(transport.clone(), None);

    let digest = client.get_image_digest("alpine", "latest").await.unwrap();
    assert_eq!(digest.as_str(), ALPINE_DIGEST);

    let tokens = transport.token_calls();
    assert_eq!(tokens.len(), 1);
    assert_eq!(
        tokens[0].url,
        "https://auth.docker.io/token?service=registry.docker.io&scope=repository%3Alibrary%2Falpine%3Apull"
    );
    assert!(tokens[0].authorization.is_none());

    let manifests = transport.manifest_calls();
    assert_eq!(manifests.len(), 2);
    assert_eq!(
        manifests[1].authorization.as_deref(),
        Some(format!("Bearer {}", token).as_str())
    );
}

#[tokio::test]
async fn test_not_found_on_first_attempt() {
    let transport = Arc::new(ScriptedTransport::new().manifest(status(404)));
    let client = client_with(transport.clone(), None);

    let err = client
        .get_image_digest("org/missing", "latest")
        .await
        .unwrap_err();
    match err {
        RegistryError::ImageNotFound { repository, tag } => {
            assert_eq!(repository, "org/missing");
            assert_eq!(tag, "latest");
        }
        other => panic!("expected ImageNotFound, got {:?}", other),
    }
    assert!(transport.token_calls().is_empty());
}

#[tokio::test]
async fn test_not_found_after_token() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .manifest(challenge("org/missing"))
            .token(token_body(&jwt("org/missing", &["pull"])))
            .manifest(status(404)),
    );
    let client = client_with(transport, None);

    let err = client.get_image_digest("org/missing", "v1").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_anonymous_token_without_grant_reports_not_found() {
    let repository = "repository/that_doesnt_exist";
    let transport = Arc::new(
        ScriptedTransport::new()
            .manifest(challenge(repository))
            .token(token_body(&jwt(repository, &[])))
            .manifest(challenge(repository)),
    );
    let client = client_with(transport.clone(), None);

    let err = client.get_image_digest(repository, "latest").await.unwrap_err();
    assert!(err.is_not_found(), "got {:?}", err);
    assert_eq!(transport.manifest_calls().len(), 2);
}

#[tokio::test]
async fn test_rejected_credentials_report_authorization() {
    let repository = "repository/that_doesnt_exist";
    let transport = Arc::new(
        ScriptedTransport::new()
            .manifest(challenge(repository))
            .token(status(401)),
    );
    let client = client_with(transport.clone(), Some("Zm9vOmJhcg=="));

    let err = client.get_image_digest(repository, "latest").await.unwrap_err();
    assert!(err.is_authorization(), "got {:?}", err);

    let manifests = transport.manifest_calls();
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].authorization.as_deref(), Some("Basic Zm9vOmJhcg=="));
    let tokens = transport.token_calls();
    assert_eq!(tokens[0].authorization.as_deref(), Some("Basic Zm9vOmJhcg=="));
}

#[tokio::test]
async fn test_authenticated_token_still_rejected_is_authorization() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .manifest(challenge("org/private"))
            .token(token_body(&jwt("org/private", &[])))
            .manifest(status(403)),
    );
    let client = client_with(transport, Some("Basic Zm9vOmJhcg=="));

    let err = client.get_image_digest("org/private", "latest").await.unwrap_err();
    assert!(err.is_authorization(), "got {:?}", err);
}

#[tokio::test]
async fn test_retry_happens_exactly_once() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .manifest(challenge("org/app"))
            .token(token_body("opaque-token"))
            .manifest(challenge("org/app")),
    );
    let client = client_with(transport.clone(), None);

    let err = client.get_image_digest("org/app", "latest").await.unwrap_err();
    assert!(err.is_authorization(), "got {:?}", err);
    assert_eq!(transport.manifest_calls().len(), 2);
    assert_eq!(transport.token_calls().len(), 1);
}

#[tokio::test]
async fn test_basic_only_challenge_is_authorization() {
    let transport = Arc::new(ScriptedTransport::new().manifest(basic_challenge()));
    let client = client_with(transport.clone(), None);

    let err = client.get_image_digest("org/app", "latest").await.unwrap_err();
    assert!(err.is_authorization());
    assert!(transport.token_calls().is_empty());
}

#[tokio::test]
async fn test_unexpected_status() {
    let transport = Arc::new(ScriptedTransport::new().manifest(status(502)));
    let client = client_with(transport, None);

    let err = client.get_image_digest("org/app", "latest").await.unwrap_err();
    match err {
        RegistryError::UnexpectedStatus { status, url } => {
            assert_eq!(status, 502);
            assert_eq!(url, "https://index.docker.io/v2/org/app/manifests/latest");
        }
        other => panic!("expected UnexpectedStatus, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_or_malformed_digest_header() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .manifest(status(200))
            .manifest(found("sha256:not-hex")),
    );
    let client = client_with(transport, None);

    let err = client.get_image_digest("org/app", "latest").await.unwrap_err();
    assert!(matches!(err, RegistryError::Parse(_)));
    let err = client.get_image_digest("org/app", "latest").await.unwrap_err();
    assert!(matches!(err, RegistryError::Parse(_)));
}

#[tokio::test]
async fn test_client_reusable_after_failure() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .manifest(status(404))
            .manifest(found(ALPINE_DIGEST))
            .manifest(found(ALPINE_DIGEST)),
    );
    let client = client_with(transport.clone(), None);

    assert!(client.get_image_digest("org/missing", "latest").await.unwrap_err().is_not_found());
    let first = client.get_image_digest("alpine", "latest").await.unwrap();
    let second = client.get_image_digest("alpine", "latest").await.unwrap();
    assert_eq!(first, second);

    // No memoization: every lookup hits the transport
    assert_eq!(transport.manifest_calls().len(), 3);
}

#[tokio::test]
async fn test_rejects_empty_inputs() {
    let transport = Arc::new(ScriptedTransport::new());
    let client = client_with(transport.clone(), None);

    assert!(matches!(
        client.get_image_digest("", "latest").await,
        Err(RegistryError::Validation(_))
    ));
    assert!(matches!(
        client.get_image_digest("alpine", " ").await,
        Err(RegistryError::Validation(_))
    ));
    assert!(transport.manifest_calls().is_empty());

    assert!(RegistryClient::new("", None).is_err());
    assert!(RegistryClient::new("https://index.docker.io", None).is_err());
}

#[tokio::test]
async fn test_insecure_registry_uses_http_and_keeps_repository() {
    let transport = Arc::new(ScriptedTransport::new().manifest(found(BUSYBOX_DIGEST)));
    let client = RegistryClient::builder("localhost:5000")
        .with_config(ClientConfig::default().with_insecure(true))
        .with_transport(transport.clone() as Arc<dyn RegistryTransport>)
        .build()
        .unwrap();

    let digest = client.get_image_digest("busybox", "1.36").await.unwrap();
    assert_eq!(digest.as_str(), BUSYBOX_DIGEST);
    assert_eq!(
        transport.manifest_calls()[0].url,
        "http://localhost:5000/v2/busybox/manifests/1.36"
    );
}

#[tokio::test]
async fn test_client_shared_across_tasks() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .manifest(found(ALPINE_DIGEST))
            .manifest(found(ALPINE_DIGEST)),
    );
    let client = Arc::new(client_with(transport, None));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get_image_digest("alpine", "latest").await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().as_str(), ALPINE_DIGEST);
    }
}
