//! HTTP client for the hosted backend.
//!
//! Auth calls go to `{url}/auth/v1`, table access to `{url}/rest/v1/{table}`.
//! Every request carries the project's anon key as `apikey`; table requests
//! carry the caller's access token so the backend's row-level security
//! applies to them.

use super::types::*;
use crate::config::BackendConfig;
use crate::domain::{AuthenticatedUser, IdentitySession, SignUpInput, UserProfile};
use crate::error::{AppError, Result};
use crate::identity::{AuthBackend, ProfileStore};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use tracing::debug;
use uuid::Uuid;

/// PostgREST query parameters (`col=eq.value`, `order`, `limit`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestQuery {
    params: Vec<(String, String)>,
}

impl RestQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    /// Case-insensitive substring match on the literal text of `needle`.
    ///
    /// `*` is dropped; `%`, `_` and `\` are escaped so they match themselves.
    pub fn ilike(mut self, column: &str, needle: &str) -> Self {
        let mut pattern = String::with_capacity(needle.len());
        for c in needle.trim().chars() {
            match c {
                '*' => {}
                '%' | '_' | '\\' => {
                    pattern.push('\\');
                    pattern.push(c);
                }
                _ => pattern.push(c),
            }
        }
        self.params
            .push((column.to_string(), format!("ilike.*{}*", pattern)));
        self
    }

    pub fn order(mut self, spec: &str) -> Self {
        self.params.push(("order".to_string(), spec.to_string()));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.params.push(("limit".to_string(), limit.to_string()));
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.params.push(("offset".to_string(), offset.to_string()));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Client for the hosted auth service and REST gateway
#[derive(Clone)]
pub struct BackendClient {
    config: BackendConfig,
    http_client: Client,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url(), path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url(), urlencoding::encode(table))
    }

    /// Attach the anon key and a bearer token (the anon key when no user token is given)
    fn authorized(&self, builder: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.config.anon_key))
    }

    /// Rows of `table` matching `query`
    pub async fn select<T: DeserializeOwned>(
        &self,
        access_token: &str,
        table: &str,
        query: &RestQuery,
    ) -> Result<Vec<T>> {
        let response = self
            .authorized(self.http_client.get(self.rest_url(table)), Some(access_token))
            .query(query.params())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(failure(response, &format!("Failed to read {}", table)).await);
        }

        parse_json(response, table).await
    }

    /// Rows of `table` matching `query`, with the total count ignoring `limit`/`offset`
    pub async fn select_with_count<T: DeserializeOwned>(
        &self,
        access_token: &str,
        table: &str,
        query: &RestQuery,
    ) -> Result<(Vec<T>, u64)> {
        let response = self
            .authorized(self.http_client.get(self.rest_url(table)), Some(access_token))
            .header("Prefer", "count=exact")
            .query(query.params())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(failure(response, &format!("Failed to read {}", table)).await);
        }

        let total = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total);
        let rows: Vec<T> = parse_json(response, table).await?;
        let total = total.unwrap_or(rows.len() as u64);
        Ok((rows, total))
    }

    /// Insert one row or an array of rows, returning what was stored
    pub async fn insert<B, T>(&self, access_token: &str, table: &str, body: &B) -> Result<Vec<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .authorized(self.http_client.post(self.rest_url(table)), Some(access_token))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(failure(response, &format!("Failed to insert into {}", table)).await);
        }

        parse_json(response, table).await
    }

    /// Patch the rows matching `query`, returning the updated rows
    pub async fn update<B, T>(
        &self,
        access_token: &str,
        table: &str,
        query: &RestQuery,
        body: &B,
    ) -> Result<Vec<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .authorized(self.http_client.patch(self.rest_url(table)), Some(access_token))
            .header("Prefer", "return=representation")
            .query(query.params())
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(failure(response, &format!("Failed to update {}", table)).await);
        }

        parse_json(response, table).await
    }

    /// Delete the rows matching `query`, returning how many were removed
    pub async fn delete(&self, access_token: &str, table: &str, query: &RestQuery) -> Result<usize> {
        let response = self
            .authorized(self.http_client.delete(self.rest_url(table)), Some(access_token))
            .header("Prefer", "return=representation")
            .query(query.params())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(failure(response, &format!("Failed to delete from {}", table)).await);
        }

        let removed: Vec<serde_json::Value> = parse_json(response, table).await?;
        Ok(removed.len())
    }
}

#[async_trait]
impl AuthBackend for BackendClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<IdentitySession> {
        let response = self
            .authorized(self.http_client.post(self.auth_url("token")), None)
            .query(&[("grant_type", "password")])
            .json(&PasswordGrant { email, password })
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            return Err(AppError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }
        if !response.status().is_success() {
            return Err(failure(response, "Failed to sign in").await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("Failed to parse token response: {}", e)))?;

        Ok(IdentitySession {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user_id: token.user.id,
            email: token.user.email,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }

    async fn sign_up(&self, input: &SignUpInput) -> Result<Uuid> {
        let request = SignUpRequest {
            email: &input.email,
            password: &input.password,
            data: SignUpMetadata {
                display_name: input.display_name.as_deref(),
            },
        };
        let response = self
            .authorized(self.http_client.post(self.auth_url("signup")), None)
            .json(&request)
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            let (_, detail) = error_detail(response).await;
            return Err(AppError::BadRequest(detail));
        }
        if !response.status().is_success() {
            return Err(failure(response, "Failed to sign up").await);
        }

        let body: SignUpResponse = response
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("Failed to parse sign-up response: {}", e)))?;

        body.user_id()
            .ok_or_else(|| AppError::Backend("Sign-up response carried no user id".to_string()))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let response = self
            .authorized(self.http_client.post(self.auth_url("logout")), Some(access_token))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                debug!("session already revoked");
                Ok(())
            }
            _ => Err(failure(response, "Failed to sign out").await),
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthenticatedUser>> {
        let response = self
            .authorized(self.http_client.get(self.auth_url("user")), Some(access_token))
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(failure(response, "Failed to resolve user").await);
        }

        let user: BackendUser = response
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("Failed to parse user: {}", e)))?;

        Ok(Some(AuthenticatedUser {
            id: user.id,
            email: user.email,
        }))
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .authorized(self.http_client.get(self.auth_url("health")), None)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(failure(response, "Backend health check failed").await);
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for BackendClient {
    async fn find_by_user_id(
        &self,
        access_token: &str,
        user_id: Uuid,
    ) -> Result<Option<UserProfile>> {
        let query = RestQuery::new().select("*").eq("id", user_id).limit(1);
        let rows: Vec<UserProfile> = self
            .select(access_token, &self.config.profiles_table, &query)
            .await?;
        Ok(rows.into_iter().next())
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response, table: &str) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| AppError::Backend(format!("Failed to parse {} response: {}", table, e)))
}

/// Status and the most useful message the backend gave
async fn error_detail(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<BackendErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.text().map(str::to_string))
        .unwrap_or(body);
    (status, detail)
}

async fn failure(response: Response, context: &str) -> AppError {
    let (status, detail) = error_detail(response).await;
    metrics::counter!(
        "semula_backend_errors_total",
        "status" => status.as_u16().to_string()
    )
    .increment(1);

    match status {
        StatusCode::UNAUTHORIZED => AppError::Unauthorized(format!("{}: {}", context, detail)),
        StatusCode::FORBIDDEN => AppError::Forbidden(format!("{}: {}", context, detail)),
        StatusCode::CONFLICT => AppError::Conflict(format!("{}: {}", context, detail)),
        _ => AppError::Backend(format!("{}: {} - {}", context, status, detail)),
    }
}
