// Integration tests for the credential resolution chain

use anyhow::Result;
use mockito::Server;
use tempfile::TempDir;

use banter::credentials::{
    Credential, CredentialError, CredentialResolver, CredentialSource, KeyFile, KeyIssuer,
};

#[tokio::test]
async fn test_issuer_is_last_resort_and_result_is_remembered() -> Result<()> {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/set-openrouter-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"key":"sk-or-issued-1"}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = TempDir::new()?;
    let key_path = dir.path().join("openrouter_api_key");
    let issuer = KeyIssuer::new(format!("{}/set-openrouter-key", server.url()), None);

    let resolver = CredentialResolver::new()
        .with_key_file(KeyFile::new(key_path.clone()))
        .with_issuer(issuer.clone());
    let (credential, source) = resolver.resolve().await?;
    assert_eq!(source, CredentialSource::Issuer);
    assert_eq!(credential.expose(), "sk-or-issued-1");

    // Second resolution is served from the key file
    let resolver = CredentialResolver::new()
        .with_key_file(KeyFile::new(key_path))
        .with_issuer(issuer);
    let (credential, source) = resolver.resolve().await?;
    assert_eq!(source, CredentialSource::KeyFile);
    assert_eq!(credential, Credential::new("sk-or-issued-1"));

    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_issuer_error_leaves_no_credential() -> Result<()> {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/set-openrouter-key")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"Failed to set API key","message":"vault locked"}"#)
        .create_async()
        .await;

    let dir = TempDir::new()?;
    let resolver = CredentialResolver::new()
        .with_explicit(Some("not-a-key".to_string()))
        .with_key_file(KeyFile::new(dir.path().join("key")))
        .with_issuer(KeyIssuer::new(
            format!("{}/set-openrouter-key", server.url()),
            Some("anon".to_string()),
        ));

    // The explicit value was present but malformed
    assert!(matches!(
        resolver.resolve().await,
        Err(CredentialError::Malformed)
    ));
    assert!(!dir.path().join("key").exists());
    Ok(())
}
