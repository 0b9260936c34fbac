//! Client for the external video generation API.
//!
//! A generation is one multipart `POST` carrying the reconciled form and an
//! optional reference image. The response lists the generated video URLs and
//! optionally the provider that served the request and the actual cost.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientConfig, GenerationClient};
pub use error::{ClientError, ClientResult};
pub use types::{GenerationPayload, GenerationResponse};
