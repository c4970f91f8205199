//! Provocation 中继
//!
//! 校验凭据、构造上游请求体、调用一次上游并返回结果。
//! 每次调用相互独立，没有共享可变状态。

use bytes::Bytes;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::providers::{Provider, UpstreamPayload};

/// 客户端请求
///
/// 两个字段都是自由文本，不做内容校验：
/// 缺失或 `null` 按空字符串处理，其它非字符串值使用其 JSON 文本
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvocationRequest {
    #[serde(default, deserialize_with = "lenient_text")]
    pub system_prompt: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub user_prompt: String,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}

impl ProvocationRequest {
    /// 从原始请求体解析，不要求 Content-Type
    ///
    /// 空请求体和非对象 JSON 视为空请求；只有无法解析的 JSON 才返回错误
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        match serde_json::from_slice::<Value>(body)? {
            value @ Value::Object(_) => serde_json::from_value(value),
            _ => Ok(Self::default()),
        }
    }
}

/// 中继失败的两种情况
#[derive(Debug)]
pub enum RelayError {
    /// 服务端未配置 API key，不会发起上游调用
    MissingCredential,
    /// 上游返回非 2xx、网络错误或响应不是合法 JSON
    Upstream(anyhow::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::MissingCredential => f.write_str("Gemini API key not configured"),
            RelayError::Upstream(err) => write!(f, "{err:#}"),
        }
    }
}

impl std::error::Error for RelayError {}

pub struct ProvocationRelay {
    api_key: Option<String>,
    provider: Arc<dyn Provider>,
}

impl ProvocationRelay {
    /// 凭据在构造时注入，调用期间不再读取环境
    pub fn new(api_key: Option<String>, provider: Arc<dyn Provider>) -> Self {
        Self { api_key, provider }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// 处理一次 provocation 请求
    ///
    /// 成功时返回上游原始响应体，不校验其中是否包含 `setup` / `task`
    pub async fn handle(&self, request: ProvocationRequest) -> Result<Bytes, RelayError> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::error!("Gemini API key not configured on the server");
            return Err(RelayError::MissingCredential);
        };

        let payload = UpstreamPayload::provocation(&request.system_prompt, &request.user_prompt);

        tracing::info!(
            provider = self.provider.name(),
            system_prompt_len = request.system_prompt.len(),
            user_prompt_len = request.user_prompt.len(),
            "request"
        );

        match self.provider.generate_content(api_key, &payload).await {
            Ok(body) => {
                tracing::info!(bytes = body.len(), "response");
                Ok(body)
            }
            Err(err) => {
                let message = format!("{err:#}");
                tracing::error!(error = %message, "Error proxying Gemini API request");
                Err(RelayError::Upstream(err))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 记录调用次数和最后一次请求体的 Provider
    pub(crate) struct MockProvider {
        reply: Box<dyn Fn() -> anyhow::Result<Bytes> + Send + Sync>,
        pub calls: AtomicUsize,
        pub last: Mutex<Option<(String, UpstreamPayload)>>,
    }

    impl MockProvider {
        pub fn replying<F>(reply: F) -> Arc<Self>
        where
            F: Fn() -> anyhow::Result<Bytes> + Send + Sync + 'static,
        {
            Arc::new(Self {
                reply: Box::new(reply),
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn generate_content(
            &self,
            api_key: &str,
            payload: &UpstreamPayload,
        ) -> anyhow::Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some((api_key.to_string(), payload.clone()));
            (self.reply)()
        }
    }

    fn request(system: &str, user: &str) -> ProvocationRequest {
        ProvocationRequest {
            system_prompt: system.to_string(),
            user_prompt: user.to_string(),
        }
    }

    #[test]
    fn test_request_missing_fields_default_to_empty() {
        let req: ProvocationRequest = serde_json::from_str(r#"{"userPrompt":"hi"}"#).unwrap();
        assert_eq!(req, request("", "hi"));
    }

    #[test]
    fn test_request_null_fields_become_empty() {
        let req: ProvocationRequest =
            serde_json::from_str(r#"{"systemPrompt":null,"userPrompt":"x"}"#).unwrap();
        assert_eq!(req, request("", "x"));
    }

    #[test]
    fn test_request_non_string_fields_use_json_text() {
        let req = ProvocationRequest::from_body(br#"{"systemPrompt":42,"userPrompt":[1,true]}"#)
            .unwrap();
        assert_eq!(req, request("42", "[1,true]"));
    }

    #[test]
    fn test_request_from_empty_or_non_object_body() {
        assert_eq!(ProvocationRequest::from_body(b"").unwrap(), request("", ""));
        assert_eq!(ProvocationRequest::from_body(b" \n").unwrap(), request("", ""));
        assert_eq!(ProvocationRequest::from_body(b"[1,2]").unwrap(), request("", ""));
        assert!(ProvocationRequest::from_body(b"{not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_credential_skips_upstream() {
        let provider = MockProvider::replying(|| Ok(Bytes::from_static(b"{}")));
        let relay = ProvocationRelay::new(None, provider.clone());

        let err = relay.handle(request("s", "u")).await.unwrap_err();
        assert!(matches!(err, RelayError::MissingCredential));
        assert_eq!(provider.call_count(), 0);
        assert!(!relay.has_credential());
    }

    #[tokio::test]
    async fn test_success_passes_body_through() {
        let raw = r#"{"setup":"A room.","task":"Sit."}"#;
        let provider = MockProvider::replying(move || Ok(Bytes::from(raw)));
        let relay = ProvocationRelay::new(Some("key".into()), provider.clone());

        let body = relay
            .handle(request("Be terse.", "Give a task."))
            .await
            .unwrap();
        assert_eq!(body, Bytes::from(raw));
        assert_eq!(provider.call_count(), 1);

        let (api_key, payload) = provider.last.lock().unwrap().clone().unwrap();
        assert_eq!(api_key, "key");
        assert_eq!(
            payload,
            UpstreamPayload::provocation("Be terse.", "Give a task.")
        );
    }

    #[tokio::test]
    async fn test_upstream_error_is_wrapped_without_retry() {
        let provider = MockProvider::replying(|| Err(anyhow::anyhow!("dns error")));
        let relay = ProvocationRelay::new(Some("key".into()), provider.clone());

        let err = relay.handle(request("s", "u")).await.unwrap_err();
        assert!(matches!(err, RelayError::Upstream(_)));
        assert_eq!(err.to_string(), "dns error");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_repeated_requests_are_identical() {
        let provider = MockProvider::replying(|| Ok(Bytes::from_static(br#"{"a":1}"#)));
        let relay = ProvocationRelay::new(Some("key".into()), provider.clone());

        let first = relay.handle(request("s", "u")).await.unwrap();
        let second = relay.handle(request("s", "u")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.call_count(), 2);
    }
}
