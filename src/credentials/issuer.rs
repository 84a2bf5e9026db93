// Remote key-issuing endpoint
//
// Success: 200 with `{"key": "..."}`. Failure: any status with
// `{"error": "...", "message": "..."}`.

use reqwest::Client;
use serde::Deserialize;

use super::{Credential, CredentialError};

#[derive(Debug, Clone)]
pub struct KeyIssuer {
    client: Client,
    url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IssuerResponse {
    key: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

impl KeyIssuer {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            token,
        }
    }

    pub async fn fetch(&self) -> Result<Credential, CredentialError> {
        tracing::debug!("Requesting API key from {}", self.url);

        let mut request = self.client.post(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CredentialError::Issuer(e.to_string()))?;
        let status = response.status();
        let body: IssuerResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Issuer(format!("{}: unreadable body: {}", status, e)))?;

        match body.key {
            Some(key) if status.is_success() => Ok(Credential::new(key)),
            _ => {
                let detail = body
                    .message
                    .or(body.error)
                    .unwrap_or_else(|| "no key in response".to_string());
                Err(CredentialError::Issuer(format!("{}: {}", status, detail)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/set-openrouter-key")
            .match_header("authorization", "Bearer anon")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"key":"sk-or-issued"}"#)
            .create_async()
            .await;

        let issuer = KeyIssuer::new(
            format!("{}/set-openrouter-key", server.url()),
            Some("anon".to_string()),
        );
        let credential = issuer.fetch().await.unwrap();
        assert_eq!(credential.expose(), "sk-or-issued");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_reports_server_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/key")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"API key not configured on server","message":"set the secret"}"#)
            .create_async()
            .await;

        let issuer = KeyIssuer::new(format!("{}/key", server.url()), None);
        let err = issuer.fetch().await.unwrap_err();
        assert!(err.to_string().contains("set the secret"));
    }
}
