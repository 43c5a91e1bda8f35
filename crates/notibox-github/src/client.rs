//! HTTP client for the GitHub notifications API.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};

use crate::error::Result;
use crate::models::{FetchNotificationsParams, NotificationThread};
use crate::retry::{execute_with_retry, RetryConfig};

/// Base URL for the GitHub REST API.
pub const BASE_URL: &str = "https://api.github.com";

/// Largest page size GitHub accepts for notifications.
pub const MAX_PER_PAGE: u32 = 50;

/// Upper bound on pages followed by one fetch.
const MAX_PAGES: u32 = 200;

const API_VERSION: &str = "2022-11-28";
const MEDIA_TYPE: &str = "application/vnd.github+json";

/// Client for the GitHub notifications API.
#[derive(Clone)]
pub struct GithubClient {
    token: String,
    http_client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubClient")
            .field("token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish()
    }
}

impl GithubClient {
    /// Creates a client for api.github.com.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(token, BASE_URL)
    }

    /// Creates a client against a different API root (GitHub Enterprise, tests).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(MEDIA_TYPE));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("notibox/", env!("CARGO_PKG_VERSION"))),
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            token: token.into(),
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        })
    }

    /// Replaces the retry policy.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the API token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches every notification thread matching `params`, following pages
    /// until GitHub returns a short page.
    pub async fn fetch_notifications(
        &self,
        params: &FetchNotificationsParams,
    ) -> Result<Vec<NotificationThread>> {
        let per_page = params.per_page.clamp(1, MAX_PER_PAGE);
        let mut threads = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = self.notifications_url(params, per_page, page);
            let batch: Vec<serde_json::Value> = self.get_json(&url, "notifications").await?;
            let count = batch.len();

            for value in batch {
                threads.push(NotificationThread::from_value(value)?);
            }

            tracing::debug!(page, count, "fetched notification page");
            if count < per_page as usize {
                break;
            }
        }

        Ok(threads)
    }

    /// Fetches the JSON document behind a subject URL (issue, pull, release, ...).
    pub async fn fetch_subject_raw(&self, subject_url: &str) -> Result<serde_json::Value> {
        let url = if subject_url.starts_with("http://") || subject_url.starts_with("https://") {
            subject_url.to_string()
        } else {
            format!("{}{}", self.base_url, subject_url)
        };
        self.get_json(&url, "subject").await
    }

    fn notifications_url(&self, params: &FetchNotificationsParams, per_page: u32, page: u32) -> String {
        let mut url = format!(
            "{}/notifications?all={}&per_page={}&page={}",
            self.base_url, params.all, per_page, page
        );
        if let Some(since) = params.since {
            url.push_str("&since=");
            url.push_str(&format_timestamp(since));
        }
        if let Some(before) = params.before {
            url.push_str("&before=");
            url.push_str(&format_timestamp(before));
        }
        url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, resource: &str) -> Result<T> {
        let response = execute_with_retry(&self.retry, resource, || {
            self.http_client.get(url).bearer_auth(&self.token).send()
        })
        .await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
