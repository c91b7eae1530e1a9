//! Request logging stage.
//!
//! One `tracing` event per completed request, rendered in one of the classic access
//! log formats. Server errors log at `error`, client errors at `warn`, everything
//! else at `info`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::Response,
    Router,
};
use tracing::{error, info, warn};

use crate::config::{LogConfig, LogFormat};
use crate::metrics;

/// Everything a log line can mention.
#[derive(Debug, Clone)]
pub struct RequestLine {
    /// Client address, when the server exposes connect info.
    pub remote_addr: Option<String>,
    /// Request timestamp, CLF formatted.
    pub date: String,
    /// HTTP method.
    pub method: String,
    /// Path and query.
    pub url: String,
    /// HTTP version, e.g. `1.1`.
    pub http_version: String,
    /// Response status.
    pub status: u16,
    /// Response `content-length`.
    pub content_length: Option<String>,
    /// `referer` request header.
    pub referrer: Option<String>,
    /// `user-agent` request header.
    pub user_agent: Option<String>,
    /// Handling time in milliseconds.
    pub response_time_ms: f64,
}

fn dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

/// Render `line` in `format`.
pub fn format_line(format: LogFormat, line: &RequestLine) -> String {
    match format {
        LogFormat::Combined => format!(
            "{} - - [{}] \"{} {} HTTP/{}\" {} {} \"{}\" \"{}\"",
            dash(&line.remote_addr),
            line.date,
            line.method,
            line.url,
            line.http_version,
            line.status,
            dash(&line.content_length),
            dash(&line.referrer),
            dash(&line.user_agent),
        ),
        LogFormat::Common => format!(
            "{} - - [{}] \"{} {} HTTP/{}\" {} {}",
            dash(&line.remote_addr),
            line.date,
            line.method,
            line.url,
            line.http_version,
            line.status,
            dash(&line.content_length),
        ),
        LogFormat::Dev => format!(
            "{} {} {} {:.3} ms - {}",
            line.method,
            line.url,
            line.status,
            line.response_time_ms,
            dash(&line.content_length),
        ),
        LogFormat::Short => format!(
            "{} - {} {} HTTP/{} {} {} - {:.3} ms",
            dash(&line.remote_addr),
            line.method,
            line.url,
            line.http_version,
            line.status,
            dash(&line.content_length),
            line.response_time_ms,
        ),
        LogFormat::Tiny => format!(
            "{} {} {} {} - {:.3} ms",
            line.method,
            line.url,
            line.status,
            dash(&line.content_length),
            line.response_time_ms,
        ),
        LogFormat::Json => serde_json::json!({
            "remote_addr": line.remote_addr,
            "date": line.date,
            "method": line.method,
            "url": line.url,
            "http_version": line.http_version,
            "status": line.status,
            "content_length": line.content_length,
            "referrer": line.referrer,
            "user_agent": line.user_agent,
            "response_time_ms": line.response_time_ms,
        })
        .to_string(),
    }
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn emit(status: StatusCode, message: &str) {
    if status.is_server_error() {
        error!(target: "app_factory::access", "{}", message);
    } else if status.is_client_error() {
        warn!(target: "app_factory::access", "{}", message);
    } else {
        info!(target: "app_factory::access", "{}", message);
    }
}

/// Middleware logging each request once its response is ready.
pub async fn log_requests(
    State(config): State<Arc<LogConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if config.ignore_paths.iter().any(|ignored| ignored == &path) {
        return next.run(request).await;
    }

    let start = Instant::now();
    let date = chrono::Utc::now().format("%d/%b/%Y:%H:%M:%S %z").to_string();
    let method = request.method().to_string();
    let url = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or(path);
    let http_version = format!("{:?}", request.version())
        .trim_start_matches("HTTP/")
        .to_string();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let referrer = header_string(request.headers(), header::REFERER);
    let user_agent = header_string(request.headers(), header::USER_AGENT);

    let response = next.run(request).await;

    let status = response.status();
    metrics::record_http_request(start, &method, status.as_u16());

    let line = RequestLine {
        remote_addr,
        date,
        method,
        url,
        http_version,
        status: status.as_u16(),
        content_length: header_string(response.headers(), header::CONTENT_LENGTH),
        referrer,
        user_agent,
        response_time_ms: start.elapsed().as_secs_f64() * 1000.0,
    };
    emit(status, &format_line(config.format, &line));

    response
}

/// Wrap `router` with the request logging stage.
pub fn apply(router: Router, config: &LogConfig) -> Router {
    router.layer(from_fn_with_state(Arc::new(config.clone()), log_requests))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use axum::body::Body;
    use axum::routing::get;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    fn line() -> RequestLine {
        RequestLine {
            remote_addr: Some("10.0.0.1".to_string()),
            date: "10/Oct/2025:13:55:36 +0000".to_string(),
            method: "GET".to_string(),
            url: "/orders?page=2".to_string(),
            http_version: "1.1".to_string(),
            status: 200,
            content_length: Some("512".to_string()),
            referrer: None,
            user_agent: Some("curl/8.0".to_string()),
            response_time_ms: 1.5,
        }
    }

    #[test]
    fn combined_format() {
        assert_eq!(
            format_line(LogFormat::Combined, &line()),
            "10.0.0.1 - - [10/Oct/2025:13:55:36 +0000] \"GET /orders?page=2 HTTP/1.1\" 200 512 \"-\" \"curl/8.0\""
        );
    }

    #[test]
    fn dev_and_tiny_formats() {
        assert_eq!(format_line(LogFormat::Dev, &line()), "GET /orders?page=2 200 1.500 ms - 512");
        assert_eq!(format_line(LogFormat::Tiny, &line()), "GET /orders?page=2 200 512 - 1.500 ms");
    }

    #[test]
    fn missing_values_render_as_dash() {
        let mut line = line();
        line.remote_addr = None;
        line.content_length = None;
        assert_eq!(
            format_line(LogFormat::Common, &line),
            "- - - [10/Oct/2025:13:55:36 +0000] \"GET /orders?page=2 HTTP/1.1\" 200 -"
        );
    }

    #[test]
    fn json_format_is_structured() {
        let value: serde_json::Value =
            serde_json::from_str(&format_line(LogFormat::Json, &line())).unwrap();
        assert_eq!(value["status"], 200);
        assert_eq!(value["referrer"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn passes_responses_through() {
        let config = LogConfig {
            format: LogFormat::Tiny,
            ignore_paths: vec!["/quiet".to_string()],
        };
        let app = apply(
            Router::new()
                .route("/loud", get(|| async { "ok" }))
                .route("/quiet", get(|| async { StatusCode::ACCEPTED })),
            &config,
        );

        let loud = app
            .clone()
            .oneshot(Request::builder().uri("/loud").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(loud.status(), StatusCode::OK);

        let quiet = app
            .oneshot(Request::builder().uri("/quiet").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(quiet.status(), StatusCode::ACCEPTED);
    }
}
