//! Gateway 中间件

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::Instrument;

/// 全局请求计数器，用于生成 request_id
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// 请求日志中间件
///
/// 为每个请求分配递增 id，记录状态码和耗时，并通过 `x-request-id` 返回给客户端
pub async fn request_logger(request: Request, next: Next) -> Response {
    let request_id = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!("req", id = request_id, %method, %path);

    async move {
        let start = std::time::Instant::now();
        let mut response = next.run(request).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status().as_u16();

        if status >= 500 {
            tracing::warn!(status, latency_ms, "done");
        } else {
            tracing::info!(status, latency_ms, "done");
        }

        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER, HeaderValue::from(request_id));
        response
    }
    .instrument(span)
    .await
}
