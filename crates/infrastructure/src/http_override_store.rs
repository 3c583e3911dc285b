use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use rollcall_application::OverrideStore;
use rollcall_core::{AppError, AppResult};
use rollcall_domain::{
    NewOverrideRecord, OverrideId, OverrideRecord, OverrideTarget, PermissionValue, ResourceKey,
};
use serde::{Deserialize, Serialize};

const OVERRIDES_PATH: &str = "permission-overrides";

/// Connection settings for [`HttpOverrideStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOverrideStoreConfig {
    /// Backend base URL without trailing slash.
    pub base_url: String,
    /// Optional bearer token sent with every request.
    pub api_token: Option<String>,
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// Attempts for idempotent reads.
    pub max_attempts: u8,
    /// Linear backoff step between read attempts.
    pub retry_backoff_ms: u64,
}

impl HttpOverrideStoreConfig {
    /// Loads settings from `ROLLCALL_*` environment variables.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("ROLLCALL_API_BASE_URL")
            .map(|value| value.trim().trim_end_matches('/').to_owned())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Validation("ROLLCALL_API_BASE_URL is required".to_owned()))?;
        let api_token = lookup("ROLLCALL_API_TOKEN")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        let timeout_ms = parse_positive(&lookup, "ROLLCALL_HTTP_TIMEOUT_MS", 10_000_u64)?;
        let max_attempts = parse_positive(&lookup, "ROLLCALL_HTTP_MAX_ATTEMPTS", 3_u8)?;
        let retry_backoff_ms = parse_positive(&lookup, "ROLLCALL_HTTP_RETRY_BACKOFF_MS", 200_u64)?;

        Ok(Self {
            base_url,
            api_token,
            timeout_ms,
            max_attempts,
            retry_backoff_ms,
        })
    }
}

fn parse_positive<F, T>(lookup: &F, name: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let value = match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("{name} must be a positive integer: {error}"))
        })?,
        None => default,
    };

    if value == T::default() {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(value)
}

#[derive(Debug, Serialize)]
struct OverridePayload<'a> {
    target_type: &'a str,
    target_id: &'a str,
    resource_key: &'a str,
    view: bool,
    create: bool,
    edit: bool,
    delete: bool,
}

impl<'a> From<&'a NewOverrideRecord> for OverridePayload<'a> {
    fn from(record: &'a NewOverrideRecord) -> Self {
        Self {
            target_type: record.target.target_type().as_str(),
            target_id: record.target.target_id(),
            resource_key: record.resource_key.as_str(),
            view: record.permission.view(),
            create: record.permission.create(),
            edit: record.permission.edit(),
            delete: record.permission.delete(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(u64),
}

#[derive(Debug, Deserialize)]
struct OverrideResponse {
    id: WireId,
    target_type: String,
    target_id: String,
    resource_key: String,
    #[serde(default)]
    view: bool,
    #[serde(default)]
    create: bool,
    #[serde(default)]
    edit: bool,
    #[serde(default)]
    delete: bool,
}

impl OverrideResponse {
    fn try_into_record(self) -> AppResult<OverrideRecord> {
        let id = match self.id {
            WireId::Text(value) => OverrideId::new(value)?,
            WireId::Number(value) => OverrideId::new(value.to_string())?,
        };
        let target = OverrideTarget::parse(&self.target_type, &self.target_id)?;
        let resource_key = ResourceKey::new(self.resource_key)?;

        Ok(NewOverrideRecord {
            target,
            resource_key,
            permission: PermissionValue::new(self.view, self.create, self.edit, self.delete),
        }
        .with_id(id))
    }
}

/// Override store backed by the school backend's REST resource.
pub struct HttpOverrideStore {
    http_client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl HttpOverrideStore {
    /// Creates a store from an existing HTTP client.
    #[must_use]
    pub fn new(http_client: reqwest::Client, config: HttpOverrideStoreConfig) -> Self {
        Self {
            http_client,
            base_url: config.base_url,
            api_token: config.api_token,
            max_attempts: config.max_attempts.max(1),
            retry_backoff_ms: config.retry_backoff_ms.max(50),
        }
    }

    /// Builds the HTTP client and the store from `config`.
    pub fn from_config(config: HttpOverrideStoreConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
        Ok(Self::new(http_client, config))
    }

    fn collection_url(&self) -> String {
        format!("{}/{OVERRIDES_PATH}", self.base_url)
    }

    fn item_url(&self, id: &OverrideId) -> AppResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(self.collection_url().as_str())
            .map_err(|error| AppError::Validation(format!("invalid backend URL: {error}")))?;
        url.path_segments_mut()
            .map_err(|()| {
                AppError::Validation(format!(
                    "backend URL '{}' cannot carry path segments",
                    self.base_url
                ))
            })?
            .push(id.as_str());
        Ok(url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn send_with_retry<F>(&self, operation: &str, build: F) -> AppResult<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = self.authorize(build(&self.http_client)).send().await;

            match response {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if is_transient(response.status()) => {
                    last_error = Some(format!(
                        "transient HTTP status {} for {operation}",
                        response.status()
                    ));
                }
                Ok(response) => return Err(error_from_response(operation, response).await),
                Err(error) => {
                    last_error = Some(format!("{operation} transport error: {error}"));
                }
            }

            if attempt < self.max_attempts {
                tracing::debug!(
                    operation,
                    attempt,
                    max_attempts = self.max_attempts,
                    "retrying permission override request"
                );
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::Internal(last_error.unwrap_or_else(|| {
            format!("{operation} exhausted retries")
        })))
    }

    async fn send_once(
        &self,
        operation: &str,
        builder: reqwest::RequestBuilder,
    ) -> AppResult<reqwest::Response> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|error| AppError::Internal(format!("{operation} transport error: {error}")))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(operation, response).await)
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

async fn error_from_response(operation: &str, response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
    error_from_status(operation, status, &body)
}

fn error_from_status(operation: &str, status: StatusCode, body: &str) -> AppError {
    let message = format!("{operation} failed with status {}: {body}", status.as_u16());
    match status {
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            AppError::Validation(message)
        }
        _ => AppError::Internal(message),
    }
}

async fn parse_json<T>(operation: &str, response: reqwest::Response) -> AppResult<T>
where
    T: serde::de::DeserializeOwned,
{
    response.json::<T>().await.map_err(|error| {
        AppError::Internal(format!(
            "failed to parse {operation} response body: {error}"
        ))
    })
}

#[async_trait]
impl OverrideStore for HttpOverrideStore {
    async fn list_overrides(&self, target: &OverrideTarget) -> AppResult<Vec<OverrideRecord>> {
        let url = reqwest::Url::parse_with_params(
            self.collection_url().as_str(),
            &[
                ("target_type", target.target_type().as_str()),
                ("target_id", target.target_id()),
            ],
        )
        .map_err(|error| AppError::Validation(format!("invalid backend URL: {error}")))?;

        let response = self
            .send_with_retry("list permission overrides", |client| client.get(url.clone()))
            .await?;
        let records: Vec<OverrideResponse> =
            parse_json("list permission overrides", response).await?;

        let mut overrides = Vec::with_capacity(records.len());
        for record in records {
            match record.try_into_record() {
                Ok(record) => overrides.push(record),
                Err(error) => tracing::warn!(
                    override_target = %target,
                    error = %error,
                    "skipping malformed permission override from backend"
                ),
            }
        }

        Ok(overrides)
    }

    async fn create_override(&self, record: NewOverrideRecord) -> AppResult<OverrideRecord> {
        let builder = self
            .http_client
            .post(self.collection_url())
            .json(&OverridePayload::from(&record));
        let response = self.send_once("create permission override", builder).await?;
        let created: OverrideResponse = parse_json("create permission override", response).await?;

        created.try_into_record()
    }

    async fn update_override(&self, id: &OverrideId, record: NewOverrideRecord) -> AppResult<()> {
        let builder = self
            .http_client
            .put(self.item_url(id)?)
            .json(&OverridePayload::from(&record));
        self.send_once("update permission override", builder)
            .await
            .map(|_| ())
    }

    async fn delete_override(&self, id: &OverrideId) -> AppResult<()> {
        let builder = self.http_client.delete(self.item_url(id)?);
        self.send_once("delete permission override", builder)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests;
