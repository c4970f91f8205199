//! Gemini Provider
//!
//! 通过 API key 调用 Gemini generateContent 接口

mod constants;
mod payload;

pub use payload::UpstreamPayload;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::de::IgnoredAny;

use crate::providers::{Provider, UpstreamStatusError};
use constants::GEMINI_API_VERSION;

/// Gemini Provider 配置
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
}

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(client: Client, config: GeminiConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `{base}/v1beta/models/{model}:generateContent?key={api_key}`
    fn endpoint(&self, api_key: &str) -> String {
        format!(
            "{}/{}/models/{}:generateContent?key={}",
            self.base_url,
            GEMINI_API_VERSION,
            self.model,
            urlencoding::encode(api_key)
        )
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_content(&self, api_key: &str, payload: &UpstreamPayload) -> Result<Bytes> {
        // URL 中带有 API key，错误信息里不能出现 URL
        let response = self
            .client
            .post(self.endpoint(api_key))
            .json(payload)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response).await;
            tracing::error!(status = status.as_u16(), body = %body, "Gemini API error response");
            return Err(UpstreamStatusError { status, body }.into());
        }

        let body = response.bytes().await.map_err(reqwest::Error::without_url)?;
        serde_json::from_slice::<IgnoredAny>(&body).context("Invalid JSON from Gemini API")?;

        Ok(body)
    }
}

/// 读取上游错误响应体，读取失败时用失败原因代替
async fn read_error_body(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(body) => body,
        Err(err) => {
            let err = err.without_url();
            tracing::warn!(error = %err, "Failed to read Gemini API error body");
            format!("<failed to read error body: {err}>")
        }
    }
}
