//! HTTP client for the sync server

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::protocol::{
    AuthResponse, ErrorResponse, LoginRequest, RegisterRequest, SyncRequest, SyncResponse,
};

/// One round trip of `POST /sync`; the seam lets tests run cycles against an
/// in-process server.
#[allow(async_fn_in_trait)]
pub trait SyncTransport {
    async fn exchange(&self, token: &str, request: &SyncRequest) -> Result<SyncResponse>;
}

/// Real HTTP transport, also serving the auth boundary endpoints
#[derive(Clone)]
pub struct HttpSyncClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSyncClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().build()?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let response = self
            .client
            .post(format!("{}/auth/login", self.base_url))
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        let response = self
            .client
            .post(format!("{}/auth/register", self.base_url))
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }
}

impl SyncTransport for HttpSyncClient {
    async fn exchange(&self, token: &str, request: &SyncRequest) -> Result<SyncResponse> {
        let response = self
            .client
            .post(format!("{}/sync", self.base_url))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Api(parse_api_error(status, &body)));
    }

    Ok(response.json::<T>().await?)
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorResponse>(body) {
        return format!("{} ({})", payload.error.trim(), status.as_u16());
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(Error::InvalidInput(
            "Server URL must not be empty".to_string(),
        ));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "Server URL must include http:// or https://".to_string(),
        ))
    }
}
