//! Service providers shipped with the framework

mod auth;
mod base;

pub use auth::AuthServiceProvider;
pub use base::{BaseServiceProvider, BUNDLES, LOGGING_BUNDLE};
