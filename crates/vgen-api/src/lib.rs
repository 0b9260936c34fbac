//! Axum HTTP API server for VGen Studio.
//!
//! This crate provides:
//! - Session-gated generator endpoints (catalog, form derivation, generation)
//! - Social sign-in with signed session cookies
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod oauth;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

pub use auth::{Session, SessionKeys, SessionUser};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::GenerationService;
pub use state::AppState;
