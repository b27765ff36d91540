//! Remote Report Store client
//!
//! `ApiClient` speaks the REST contract of the report server. The offline core
//! only depends on the two narrow traits below, so tests can swap the server
//! for a fake.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capture_app::config::Config;
use crate::capture_app::error::RemoteError;
use crate::shared::report::ApiMessage;
use crate::shared::template::TEST_TEMPLATE_ID;
use crate::shared::{ReportPayload, ReportSummary, SubmitReceipt, Template};

/// Destination of submitted reports
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Submit one payload; resolves to the store-assigned identifier
    async fn submit_report(&self, payload: &ReportPayload) -> Result<String, RemoteError>;
}

/// Lightweight reachability check used when no native connectivity signal exists
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Successful `POST /api/login` response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub token: String,
}

/// `GET /api/health` response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub has_db: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// HTTP client for the report server
#[derive(Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Build a client from configuration, picking up any stored token
    pub fn new(config: &Config) -> Result<Self, RemoteError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.app().request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.server_url().to_string(),
            token: RwLock::new(config.get_token().cloned()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn clear_token(&self) {
        self.set_token(None);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Log in and keep the issued token for later calls
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, RemoteError> {
        let response = self
            .client
            .post(self.url("/api/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        // A 401 here means bad credentials, not an expired session.
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let login: LoginResponse = decode(response).await?;
        self.set_token(Some(login.token.clone()));
        debug!(email = %login.email, "Logged in");
        Ok(login)
    }

    /// `POST /api/reports`
    pub async fn submit_report(&self, payload: &ReportPayload) -> Result<String, RemoteError> {
        let request = self.client.post(self.url("/api/reports")).json(payload);
        let response = self.send(request).await?;
        let receipt: SubmitReceipt = decode(response).await?;

        receipt
            .server_id()
            .map(str::to_string)
            .ok_or(RemoteError::MissingIdentifier)
    }

    /// `GET /api/reports`
    pub async fn list_reports(&self) -> Result<Vec<ReportSummary>, RemoteError> {
        let response = self.send(self.client.get(self.url("/api/reports"))).await?;
        decode(response).await
    }

    /// `GET /api/reports/{id}`
    pub async fn get_report(&self, id: &str) -> Result<ReportSummary, RemoteError> {
        let path = format!("/api/reports/{}", id);
        let response = self.send(self.client.get(self.url(&path))).await?;
        decode(response).await
    }

    /// `GET /api/templates`
    pub async fn list_templates(&self) -> Result<Vec<Template>, RemoteError> {
        let response = self.send(self.client.get(self.url("/api/templates"))).await?;
        decode(response).await
    }

    /// Server templates with the built-in template first
    ///
    /// Never fails: when the list cannot be fetched only the built-in
    /// template is returned.
    pub async fn templates_with_fallback(&self) -> Vec<Template> {
        let mut templates = vec![Template::test_template()];
        match self.list_templates().await {
            Ok(remote) => {
                templates.extend(remote.into_iter().filter(|t| !t.is_test_template()));
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch templates, using built-in template only");
            }
        }
        templates
    }

    /// `GET /api/templates/{id}`; the built-in template is served locally
    pub async fn get_template(&self, id: &str) -> Result<Template, RemoteError> {
        if id == TEST_TEMPLATE_ID {
            return Ok(Template::test_template());
        }
        let path = format!("/api/templates/{}", id);
        let response = self.send(self.client.get(self.url(&path))).await?;
        decode(response).await
    }

    /// `GET /api/health`
    pub async fn health(&self) -> Result<HealthStatus, RemoteError> {
        let response = self.send(self.client.get(self.url("/api/health"))).await?;
        decode(response).await
    }

    /// Send an authenticated request and turn error statuses into `RemoteError`
    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!("Server answered 401, clearing session token");
            self.clear_token();
            return Err(RemoteError::Unauthorized);
        }
        if !status.is_success() {
            return Err(rejection(response).await);
        }
        Ok(response)
    }
}

/// Build `RemoteError::Rejected` from a non-2xx response
///
/// Uses the `message` of a JSON error body, else the raw body, else the
/// status reason phrase.
async fn rejection(response: Response) -> RemoteError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ApiMessage>(&body) {
        Ok(api) => api.message,
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
    };

    RemoteError::Rejected { status, message }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl ReportStore for ApiClient {
    async fn submit_report(&self, payload: &ReportPayload) -> Result<String, RemoteError> {
        ApiClient::submit_report(self, payload).await
    }
}

#[async_trait]
impl ReachabilityProbe for ApiClient {
    async fn is_reachable(&self) -> bool {
        match self.health().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Health probe failed");
                false
            }
        }
    }
}
