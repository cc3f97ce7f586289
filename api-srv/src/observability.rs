use axum::response::Response;
use axum::{extract::Request, middleware::Next};
use std::time::Instant;
use tracing::info;

/// Logs every request and its outcome
///
/// Only the path is logged: query strings may carry authorization codes.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    info!("request method={} path={path}", parts.method);
    let begin = Instant::now();
    let response = next.run(Request::from_parts(parts, body)).await;
    let duration = begin.elapsed();
    info!(
        "response status={} path={path} duration_ms={}",
        response.status(),
        duration.as_millis()
    );
    response
}
