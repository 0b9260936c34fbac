//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vgen_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vgen_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vgen_http_requests_in_flight";

    // Generation metrics
    pub const GENERATIONS_STARTED_TOTAL: &str = "vgen_generations_started_total";
    pub const GENERATIONS_SUCCEEDED_TOTAL: &str = "vgen_generations_succeeded_total";
    pub const GENERATIONS_FAILED_TOTAL: &str = "vgen_generations_failed_total";
    pub const GENERATIONS_STALE_TOTAL: &str = "vgen_generations_stale_total";
    pub const GENERATION_DURATION_SECONDS: &str = "vgen_generation_duration_seconds";

    // Gate and rate limiting metrics
    pub const GATE_REDIRECTS_TOTAL: &str = "vgen_gate_redirects_total";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vgen_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a generation attempt entering `submitting`.
pub fn record_generation_started(provider: &str) {
    let labels = [("provider", provider.to_string())];
    counter!(names::GENERATIONS_STARTED_TOTAL, &labels).increment(1);
}

/// Record a successful generation and its duration.
pub fn record_generation_succeeded(provider: &str, duration_secs: f64) {
    let labels = [("provider", provider.to_string())];
    counter!(names::GENERATIONS_SUCCEEDED_TOTAL, &labels).increment(1);
    histogram!(names::GENERATION_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a failed generation.
pub fn record_generation_failed(provider: &str, status: Option<u16>) {
    let labels = [
        ("provider", provider.to_string()),
        (
            "status",
            status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()),
        ),
    ];
    counter!(names::GENERATIONS_FAILED_TOTAL, &labels).increment(1);
}

/// Record a completion discarded because a newer attempt superseded it.
pub fn record_generation_stale(provider: &str) {
    let labels = [("provider", provider.to_string())];
    counter!(names::GENERATIONS_STALE_TOTAL, &labels).increment(1);
}

/// Record a sign-in redirect issued by the session gate.
pub fn record_gate_redirect(path: &str) {
    let labels = [("group", route_group(path))];
    counter!(names::GATE_REDIRECTS_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("group", route_group(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Fixed label for a request path, for counters fed by unauthenticated
/// or unmatched requests.
pub fn route_group(path: &str) -> &'static str {
    let Some(rest) = path.strip_prefix("/api/") else {
        return "page";
    };
    match rest.split('/').next().unwrap_or_default() {
        "auth" => "auth",
        "providers" => "providers",
        "form" => "form",
        "generate" => "generate",
        _ => "api_other",
    }
}

static PROVIDER_ID_SEGMENT: LazyLock<regex_lite::Regex> =
    LazyLock::new(|| regex_lite::Regex::new(r"/api/providers/[a-zA-Z0-9_.-]+").unwrap());
static AUTH_PROVIDER_SEGMENT: LazyLock<regex_lite::Regex> = LazyLock::new(|| {
    regex_lite::Regex::new(r"/api/auth/(signin|callback)/[a-zA-Z0-9_.-]+").unwrap()
});
static NUMERIC_SEGMENT: LazyLock<regex_lite::Regex> =
    LazyLock::new(|| regex_lite::Regex::new(r"/[0-9]+(/|$)").unwrap());

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    let path = PROVIDER_ID_SEGMENT.replace_all(path, "/api/providers/:id");
    let path = AUTH_PROVIDER_SEGMENT.replace_all(&path, "/api/auth/$1/:provider");
    let path = NUMERIC_SEGMENT.replace_all(&path, "/:id$1");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
