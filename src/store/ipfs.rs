use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{Cid, ContentStore, StoreError};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for an IPFS HTTP API endpoint.
#[derive(Debug, Clone)]
pub struct IpfsConfig {
    /// Base URL, e.g. `https://ipfs.infura.io:5001`
    pub api_url: String,
    /// Basic-auth user (Infura project id)
    pub project_id: Option<String>,
    /// Basic-auth password (Infura project secret)
    pub project_secret: Option<String>,
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://ipfs.infura.io:5001".to_string(),
            project_id: None,
            project_secret: None,
        }
    }
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

/// Publishes content through `POST /api/v0/add`.
#[derive(Clone)]
pub struct IpfsStore {
    config: IpfsConfig,
    client: reqwest::Client,
}

impl IpfsStore {
    pub fn new(config: IpfsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    fn add_url(&self) -> String {
        format!("{}/api/v0/add", self.config.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ContentStore for IpfsStore {
    async fn publish(&self, bytes: Vec<u8>) -> Result<Cid, StoreError> {
        let form = Form::new().part("file", Part::bytes(bytes).file_name("metadata.json"));

        let mut request = self.client.post(self.add_url()).multipart(form);
        if let Some(user) = &self.config.project_id {
            request = request.basic_auth(user, self.config.project_secret.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: AddResponse = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        Ok(Cid(body.hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{http::StatusCode, Router};
    use serde_json::json;

    async fn spawn_ipfs(status: StatusCode, body: serde_json::Value) -> String {
        let app = Router::new().route(
            "/api/v0/add",
            post(move || {
                let body = body.clone();
                async move { (status, axum::Json(body)) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    fn store_for(url: String) -> IpfsStore {
        IpfsStore::new(IpfsConfig {
            api_url: url,
            project_id: Some("id".to_string()),
            project_secret: Some("secret".to_string()),
        })
    }

    #[tokio::test]
    async fn publish_returns_hash() {
        let url = spawn_ipfs(
            StatusCode::OK,
            json!({"Name": "metadata.json", "Hash": "QmTest", "Size": "12"}),
        )
        .await;
        let cid = store_for(url).publish(b"{}".to_vec()).await.unwrap();
        assert_eq!(cid, Cid("QmTest".to_string()));
    }

    #[tokio::test]
    async fn publish_maps_error_status() {
        let url = spawn_ipfs(StatusCode::UNAUTHORIZED, json!({"Message": "no"})).await;
        let err = store_for(url).publish(b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { status: 401, .. }));
    }

    #[tokio::test]
    async fn publish_rejects_malformed_body() {
        let url = spawn_ipfs(StatusCode::OK, json!({"unexpected": true})).await;
        let err = store_for(url).publish(b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidResponse(_)));
    }
}
