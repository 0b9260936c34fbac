//! Request handlers.

pub mod auth;
pub mod form;
pub mod generate;
pub mod health;
pub mod providers;
pub mod views;

pub use auth::*;
pub use form::*;
pub use generate::*;
pub use health::*;
pub use providers::*;
pub use views::*;
