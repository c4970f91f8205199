use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;

/// 是否禁用 TLS 验证（用于调试 mitmproxy 等场景）
pub fn should_disable_tls_verify() -> bool {
    std::env::var("RELAY_DISABLE_TLS_VERIFY")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn user_agent() -> String {
    format!("provoke-relay/{}", env!("CARGO_PKG_VERSION"))
}

/// 创建上游 API 客户端
///
/// 不设置整体超时，只使用传输层默认行为
pub fn build_upstream_client() -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(user_agent())
        .pool_max_idle_per_host(10);

    if should_disable_tls_verify() {
        tracing::warn!("TLS certificate verification is DISABLED - for debugging only!");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder.build().context("Failed to create upstream HTTP client")
}

/// 获取共享的 HTTP 客户端（用于 CLI 自测等一般请求）
static SHARED_CLIENT: OnceLock<Client> = OnceLock::new();

pub fn get_shared_client() -> &'static Client {
    SHARED_CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent())
            .build()
            .unwrap_or_default()
    })
}

/// 截断过长的文本用于日志输出
#[inline]
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text() {
        assert_eq!(truncate_for_log("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_for_log("你好世界", 2), "你好...");
    }
}
