// REST backend client for robot metadata
use crate::application::robot_directory::RobotDirectory;
use crate::domain::robot::RobotInfo;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct AuthTokens {
    access: String,
    refresh: String,
}

/// The list endpoint may or may not be paginated
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RobotList {
    Page { results: Vec<RobotInfo> },
    Plain(Vec<RobotInfo>),
}

impl RobotList {
    fn into_robots(self) -> Vec<RobotInfo> {
        match self {
            RobotList::Page { results } => results,
            RobotList::Plain(robots) => robots,
        }
    }
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

pub struct HttpRobotApi {
    base_url: String,
    refresh_path: String,
    client: reqwest::Client,
    tokens: RwLock<AuthTokens>,
}

impl HttpRobotApi {
    pub fn new(base_url: String, access_token: String, refresh_token: String, refresh_path: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            refresh_path,
            client: reqwest::Client::new(),
            tokens: RwLock::new(AuthTokens {
                access: access_token,
                refresh: refresh_token,
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_get(&self, url: &str) -> Result<reqwest::Response> {
        let access = self.tokens.read().await.access.clone();
        self.client
            .get(url)
            .bearer_auth(access)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))
    }

    /// GET with the bearer token, refreshing it once on 401
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);

        let mut response = self.send_get(&url).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!(url = %url, "Access token rejected, refreshing");
            self.refresh_access_token().await?;
            response = self.send_get(&url).await?;
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Request to {} failed with status {}: {}", url, status, body);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    async fn refresh_access_token(&self) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        if tokens.refresh.is_empty() {
            anyhow::bail!("Access token expired and no refresh token is configured");
        }

        let response = self
            .client
            .post(self.url(&self.refresh_path))
            .json(&RefreshRequest {
                refresh: &tokens.refresh,
            })
            .send()
            .await
            .context("Failed to send token refresh request")?;

        if !response.status().is_success() {
            anyhow::bail!("Token refresh failed with status {}", response.status());
        }

        let refreshed = response
            .json::<RefreshResponse>()
            .await
            .context("Failed to parse token refresh response")?;

        tokens.access = refreshed.access;
        if let Some(refresh) = refreshed.refresh {
            tokens.refresh = refresh;
        }
        tracing::debug!("Access token refreshed");
        Ok(())
    }
}

pub fn robot_path(robot_id: &str) -> String {
    format!("/robots/{}/", urlencoding::encode(robot_id))
}

#[async_trait]
impl RobotDirectory for HttpRobotApi {
    async fn list_robots(&self) -> Result<Vec<RobotInfo>> {
        let list: RobotList = self.get_json("/robots/").await?;
        Ok(list.into_robots())
    }

    async fn get_robot(&self, robot_id: &str) -> Result<RobotInfo> {
        self.get_json(&robot_path(robot_id)).await
    }
}
