//! Path classification and redirect safety.
//!
//! This module provides:
//! - The public allow-list and exclusion rules used by the session gate
//! - Sign-in redirect construction
//! - Callback URL validation (open-redirect protection)
//! - Input sanitization utilities

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::Url;

/// Maximum prompt length.
pub const MAX_PROMPT_LENGTH: u64 = 5000;

/// Maximum negative prompt length.
pub const MAX_NEGATIVE_PROMPT_LENGTH: u64 = 2000;

/// Maximum callback URL length accepted from the query string.
const MAX_CALLBACK_URL_LENGTH: usize = 2048;

/// Sign-in page path.
pub const SIGN_IN_PATH: &str = "/signin";

/// Path prefixes never subject to the session gate.
const EXCLUDED_PREFIXES: &[&str] = &["/static/", "/assets/"];

/// Exact paths never subject to the session gate.
const EXCLUDED_PATHS: &[&str] = &[
    "/favicon.ico",
    "/health",
    "/healthz",
    "/ready",
    "/metrics",
];

/// Last path segment carrying a static asset extension.
static STATIC_ASSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)/[^/]*\.(?:ico|png|jpe?g|gif|svg|webp|avif|bmp|css|js|mjs|map|json|txt|xml|webmanifest|woff2?|ttf|otf|eot|mp4|webm)$",
    )
    .unwrap()
});

/// Check if a path bypasses the session check entirely. The asset
/// extension rule does not apply under `/api/`.
pub fn is_excluded_path(path: &str) -> bool {
    EXCLUDED_PATHS.contains(&path)
        || EXCLUDED_PREFIXES.iter().any(|p| path.starts_with(p))
        || (!path.starts_with("/api/") && STATIC_ASSET.is_match(path))
}

/// Check if a path is reachable without a session.
pub fn is_public_path(path: &str) -> bool {
    path == "/"
        || path == SIGN_IN_PATH
        || path.starts_with("/signin/")
        || path == "/api/auth"
        || path.starts_with("/api/auth/")
}

/// Sign-in location for an unauthenticated request to `path_and_query`.
pub fn sign_in_redirect(path_and_query: &str) -> String {
    format!(
        "{}?callbackUrl={}",
        SIGN_IN_PATH,
        urlencoding::encode(path_and_query)
    )
}

/// Resolve a post-sign-in callback to a same-origin relative path.
///
/// Relative paths are kept; absolute URLs are accepted only when they share
/// the origin of `public_url` and are reduced to their path and query.
/// Everything else falls back to `/`.
pub fn safe_callback_url(raw: Option<&str>, public_url: &str) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return "/".to_string();
    };

    if raw.len() > MAX_CALLBACK_URL_LENGTH || raw.contains('\\') || raw.chars().any(char::is_control) {
        warn!("Rejected malformed callback URL");
        return "/".to_string();
    }

    if raw.starts_with('/') {
        // Protocol-relative URLs point at another host
        if raw.starts_with("//") {
            warn!(callback = %raw, "Rejected protocol-relative callback URL");
            return "/".to_string();
        }
        return raw.to_string();
    }

    let (Ok(target), Ok(base)) = (Url::parse(raw), Url::parse(public_url)) else {
        return "/".to_string();
    };

    if target.origin() != base.origin() {
        warn!(callback = %raw, "Rejected cross-origin callback URL");
        return "/".to_string();
    }

    match target.query() {
        Some(q) => format!("{}?{}", target.path(), q),
        None => target.path().to_string(),
    }
}

/// Sanitize a string by removing control characters and trimming.
pub fn sanitize_string(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/"));
        assert!(is_public_path("/signin"));
        assert!(is_public_path("/signin/error"));
        assert!(is_public_path("/api/auth/session"));
        assert!(is_public_path("/api/auth/callback/google"));

        assert!(!is_public_path("/api/generate"));
        assert!(!is_public_path("/api/providers"));
        assert!(!is_public_path("/signing"));
        assert!(!is_public_path("/api/authz"));
    }

    #[test]
    fn test_excluded_paths() {
        assert!(is_excluded_path("/favicon.ico"));
        assert!(is_excluded_path("/static/app.js"));
        assert!(is_excluded_path("/assets/logo"));
        assert!(is_excluded_path("/images/hero.PNG"));
        assert!(is_excluded_path("/health"));
        assert!(is_excluded_path("/metrics"));

        assert!(!is_excluded_path("/api/generate"));
        assert!(!is_excluded_path("/dashboard"));
        assert!(!is_excluded_path("/healthcheck"));
        // Only the last segment counts
        assert!(!is_excluded_path("/v1.css/secret"));
        assert!(!is_excluded_path("/api/providers/veo3.json"));
    }

    #[test]
    fn test_sign_in_redirect_encodes_callback() {
        assert_eq!(
            sign_in_redirect("/api/generate/status?x=1&y=2"),
            "/signin?callbackUrl=%2Fapi%2Fgenerate%2Fstatus%3Fx%3D1%26y%3D2"
        );
    }

    #[test]
    fn test_safe_callback_url() {
        let base = "https://studio.example.com";
        assert_eq!(safe_callback_url(None, base), "/");
        assert_eq!(safe_callback_url(Some("/gallery?tab=2"), base), "/gallery?tab=2");
        assert_eq!(safe_callback_url(Some("//evil.com/x"), base), "/");
        assert_eq!(safe_callback_url(Some("/\\evil.com"), base), "/");
        assert_eq!(safe_callback_url(Some("https://evil.com/x"), base), "/");
        assert_eq!(
            safe_callback_url(Some("https://studio.example.com/a?b=c"), base),
            "/a?b=c"
        );
        assert_eq!(safe_callback_url(Some("javascript:alert(1)"), base), "/");
    }

    #[test]
    fn test_sanitize_string() {
        assert_eq!(sanitize_string("  hello\u{0000}world  "), "helloworld");
        assert_eq!(sanitize_string("line1\nline2"), "line1\nline2");
    }
}
