//! Reddit 貼文來源。
//!
//! 有設定 client 憑證時使用 application-only OAuth，否則（或 OAuth 失敗時）
//! 改用公開的 JSON listing。

use crate::domain::model::RawPostRecord;
use crate::domain::ports::PostSource;
use crate::utils::error::{IdeaFilterError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RedditSettings {
    pub base_url: String,
    pub oauth_base_url: String,
    pub auth_url: String,
    pub user_agent: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timeout: Duration,
    /// 連續請求之間的固定間隔，避免觸發匿名 API 的速率限制
    pub request_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct RedditSource {
    client: Client,
    settings: RedditSettings,
    token: Mutex<Option<String>>,
    requested: AtomicBool,
}

impl RedditSource {
    pub fn new(settings: RedditSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            settings,
            token: Mutex::new(None),
            requested: AtomicBool::new(false),
        })
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.settings.client_id, &self.settings.client_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }

    async fn access_token(&self, client_id: &str, client_secret: &str) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        tracing::debug!("Requesting Reddit application token");
        let response = self
            .client
            .post(&self.settings.auth_url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IdeaFilterError::SourceError {
                source_name: "reddit-oauth".to_string(),
                message: format!("token request returned HTTP {}", response.status()),
            });
        }

        let token: TokenResponse = response.json().await?;
        *cached = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn fetch_authenticated(
        &self,
        source_name: &str,
        limit: usize,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Vec<RawPostRecord>> {
        let token = self.access_token(client_id, client_secret).await?;
        let url = format!(
            "{}/r/{}/new",
            self.settings.oauth_base_url.trim_end_matches('/'),
            source_name
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("limit", limit.to_string()), ("raw_json", "1".to_string())])
            .send()
            .await?;

        Self::read_listing(source_name, response).await
    }

    async fn fetch_anonymous(&self, source_name: &str, limit: usize) -> Result<Vec<RawPostRecord>> {
        let url = format!(
            "{}/r/{}/new.json",
            self.settings.base_url.trim_end_matches('/'),
            source_name
        );

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit.to_string()), ("raw_json", "1".to_string())])
            .send()
            .await?;

        Self::read_listing(source_name, response).await
    }

    async fn read_listing(source_name: &str, response: reqwest::Response) -> Result<Vec<RawPostRecord>> {
        let status = response.status();
        tracing::debug!(source = source_name, status = %status, "Reddit listing response");

        if !status.is_success() {
            return Err(IdeaFilterError::SourceError {
                source_name: source_name.to_string(),
                message: format!("listing request returned HTTP {}", status),
            });
        }

        let listing: serde_json::Value = response.json().await?;
        parse_listing(source_name, listing)
    }
}

/// 取出 `data.children[].data`；缺少 `data` 物件的項目以空記錄保留，交由正規化計入略過數
pub fn parse_listing(source_name: &str, listing: serde_json::Value) -> Result<Vec<RawPostRecord>> {
    let children = listing
        .get("data")
        .and_then(|d| d.get("children"))
        .and_then(|c| c.as_array())
        .ok_or_else(|| IdeaFilterError::SourceError {
            source_name: source_name.to_string(),
            message: "unexpected listing shape: missing data.children".to_string(),
        })?;

    let records: Vec<RawPostRecord> = children
        .iter()
        .map(|child| {
            child
                .get("data")
                .cloned()
                .and_then(RawPostRecord::from_json)
                .unwrap_or_default()
        })
        .collect();

    let malformed = records.iter().filter(|r| r.data.is_empty()).count();
    if malformed > 0 {
        tracing::warn!(source = source_name, malformed, "Listing children without a data object");
    }

    Ok(records)
}

#[async_trait]
impl PostSource for RedditSource {
    async fn fetch(&self, source_name: &str, limit: usize) -> Result<Vec<RawPostRecord>> {
        if self.requested.swap(true, Ordering::SeqCst) && !self.settings.request_delay.is_zero() {
            tokio::time::sleep(self.settings.request_delay).await;
        }

        if let Some((client_id, client_secret)) = self.credentials() {
            match self
                .fetch_authenticated(source_name, limit, client_id, client_secret)
                .await
            {
                Ok(records) => {
                    tracing::info!(source = source_name, count = records.len(), "Fetched posts with authenticated API");
                    return Ok(records);
                }
                Err(e) => {
                    tracing::warn!(
                        source = source_name,
                        error = %e,
                        "Authenticated Reddit API failed, falling back to anonymous API"
                    );
                }
            }
        } else {
            tracing::debug!(source = source_name, "No Reddit credentials, using anonymous API");
        }

        let records = self.fetch_anonymous(source_name, limit).await?;
        tracing::info!(source = source_name, count = records.len(), "Fetched posts with anonymous API");
        Ok(records)
    }
}
