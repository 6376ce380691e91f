//! Token models: redacted secrets and issued access tokens.

pub mod access;
pub mod secret;
