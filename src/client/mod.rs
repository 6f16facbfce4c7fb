//! Backend API client.
//!
//! The backend is an opaque collaborator that accepts and returns targeting
//! documents and version lists; this client owns the HTTP surface and maps
//! non-success responses into the client-side error taxonomy.

use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{
    PublishRequest, SegmentPage, TargetingDocument, VersionPage, VersionsByVersion,
};

/// What an existence check probes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistsKind {
    Key,
    Name,
}

impl ExistsKind {
    fn as_str(&self) -> &'static str {
        match self {
            ExistsKind::Key => "KEY",
            ExistsKind::Name => "NAME",
        }
    }
}

/// Client for all targeting-console backend operations.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        Self::from_parts(config.base_url.clone(), config.api_token.clone())
    }

    pub fn from_parts(base_url: String, api_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    /// Get the live targeting document for a toggle in an environment.
    pub async fn get_targeting(
        &self,
        project_key: &str,
        environment_key: &str,
        toggle_key: &str,
    ) -> Result<TargetingDocument, AppError> {
        let url = self.targeting_url(project_key, environment_key, toggle_key);
        tracing::debug!(%url, "loading targeting document");
        let response = self.authorized(self.http.get(&url)).send().await?;
        decode(response).await
    }

    /// Publish a targeting document. All-or-nothing against the backend.
    pub async fn publish_targeting(
        &self,
        project_key: &str,
        environment_key: &str,
        toggle_key: &str,
        request: &PublishRequest,
    ) -> Result<(), AppError> {
        let url = self.targeting_url(project_key, environment_key, toggle_key);
        tracing::debug!(%url, "publishing targeting document");
        let response = self
            .authorized(self.http.patch(&url))
            .json(request)
            .send()
            .await?;
        expect_success(response).await
    }

    /// Fetch one page of published versions, newest first. `version`
    /// restricts the listing to versions at or below it, so pagination can
    /// continue a deep-link-seeded view without re-fetching newer entries.
    pub async fn get_versions(
        &self,
        project_key: &str,
        environment_key: &str,
        toggle_key: &str,
        page_index: i64,
        page_size: usize,
        version: Option<i64>,
    ) -> Result<VersionPage, AppError> {
        let mut url = format!(
            "{}/versions?pageIndex={}&pageSize={}",
            self.targeting_url(project_key, environment_key, toggle_key),
            page_index,
            page_size
        );
        if let Some(version) = version {
            url.push_str(&format!("&version={}", version));
        }
        let response = self.authorized(self.http.get(&url)).send().await?;
        decode(response).await
    }

    /// Seed history around a specific version referenced by a deep link.
    pub async fn get_versions_by_version(
        &self,
        project_key: &str,
        environment_key: &str,
        toggle_key: &str,
        version: i64,
    ) -> Result<VersionsByVersion, AppError> {
        let url = format!(
            "{}/versions/{}",
            self.targeting_url(project_key, environment_key, toggle_key),
            version
        );
        let response = self.authorized(self.http.get(&url)).send().await?;
        decode(response).await
    }

    /// List segments for a project, used to populate segment-condition
    /// operand choices.
    pub async fn list_segments(
        &self,
        project_key: &str,
        page_index: i64,
        page_size: usize,
    ) -> Result<SegmentPage, AppError> {
        let url = format!(
            "{}/projects/{}/segments?pageIndex={}&pageSize={}",
            self.base_url, project_key, page_index, page_size
        );
        let response = self.authorized(self.http.get(&url)).send().await?;
        decode(response).await
    }

    /// Check whether a toggle key/name is already taken in a project.
    /// The backend answers with 409 when taken; that is a normal outcome,
    /// not an error.
    pub async fn toggle_exists(
        &self,
        project_key: &str,
        kind: ExistsKind,
        value: &str,
    ) -> Result<bool, AppError> {
        let url = format!("{}/projects/{}/toggles/exists", self.base_url, project_key);
        self.check_exists(&url, kind, value).await
    }

    /// Check whether a segment key/name is already taken in a project.
    pub async fn segment_exists(
        &self,
        project_key: &str,
        kind: ExistsKind,
        value: &str,
    ) -> Result<bool, AppError> {
        let url = format!("{}/projects/{}/segments/exists", self.base_url, project_key);
        self.check_exists(&url, kind, value).await
    }

    async fn check_exists(
        &self,
        url: &str,
        kind: ExistsKind,
        value: &str,
    ) -> Result<bool, AppError> {
        let response = self
            .authorized(self.http.get(url))
            .query(&[("type", kind.as_str()), ("value", value)])
            .send()
            .await?;
        match response.status() {
            StatusCode::CONFLICT => Ok(true),
            status if status.is_success() => Ok(false),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(AppError::from_status(status, message))
            }
        }
    }

    fn targeting_url(
        &self,
        project_key: &str,
        environment_key: &str,
        toggle_key: &str,
    ) -> String {
        format!(
            "{}/projects/{}/environments/{}/toggles/{}/targeting",
            self.base_url, project_key, environment_key, toggle_key
        )
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.header(AUTHORIZATION, token),
            None => builder,
        }
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        tracing::warn!(%status, "backend request failed");
        return Err(AppError::from_status(status, message));
    }
    Ok(response.json().await?)
}

async fn expect_success(response: reqwest::Response) -> Result<(), AppError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        tracing::warn!(%status, "backend request failed");
        return Err(AppError::from_status(status, message));
    }
    Ok(())
}
