//! Provider 抽象层
//!
//! 定义上游生成式 API 的统一接口，中继只依赖这个 trait

pub mod gemini;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use std::fmt;

pub use gemini::{GeminiConfig, GeminiProvider, UpstreamPayload};

/// 上游返回非 2xx 状态码
///
/// 保留状态码和原始响应体，调用方可以通过 `downcast_ref` 区分限流等情况
#[derive(Debug, Clone)]
pub struct UpstreamStatusError {
    pub status: StatusCode,
    pub body: String,
}

impl UpstreamStatusError {
    pub fn is_rate_limited(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }
}

impl fmt::Display for UpstreamStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API error: {} {}", self.status.as_u16(), self.body)
    }
}

impl std::error::Error for UpstreamStatusError {}

/// Provider Trait - 上游生成式 API 的统一接口
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider 名称（用于日志和标识）
    fn name(&self) -> &str;

    /// 发送一次生成请求，成功时返回上游原始 JSON 响应体
    ///
    /// 只做一次调用，不重试
    async fn generate_content(&self, api_key: &str, payload: &UpstreamPayload) -> Result<Bytes>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message() {
        let err = UpstreamStatusError {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 429 rate limited");
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_status_error_downcast() {
        let err: anyhow::Error = UpstreamStatusError {
            status: StatusCode::BAD_REQUEST,
            body: "{}".to_string(),
        }
        .into();
        let status_err = err.downcast_ref::<UpstreamStatusError>().unwrap();
        assert!(!status_err.is_rate_limited());
    }
}
