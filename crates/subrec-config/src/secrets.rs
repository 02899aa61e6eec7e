//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"SUBREC_REMOTE_TOKEN"`).
//! - At startup, callers invoke [`resolve_secrets`] once and pass the result
//!   into client constructors; never scatter `std::env::var` calls.
//! - `Debug` output **redacts** values.
//! - Error messages reference the env var **NAME**, never the value.
//!
//! # Enforcement
//! The remote subscription token is required only when a remote base URL is
//! configured. Without a base URL no remote client is built and nothing is
//! required.

use anyhow::{bail, Result};
use serde_json::Value;

/// Env var consulted when `remote.auth_token_env` is absent.
pub const DEFAULT_REMOTE_TOKEN_ENV: &str = "SUBREC_REMOTE_TOKEN";

/// Secrets resolved from the environment. **Values are redacted in `Debug`.**
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Bearer token for the remote subscription server.
    pub remote_auth_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "remote_auth_token",
                &self.remote_auth_token.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve all secrets referenced by `config_json`.
///
/// # Errors
/// `SECRETS_MISSING` naming the env var when `remote.base_url` is set but the
/// token variable is unset or blank.
pub fn resolve_secrets(config_json: &Value) -> Result<ResolvedSecrets> {
    let token_var = read_str_at(config_json, "/remote/auth_token_env")
        .unwrap_or_else(|| DEFAULT_REMOTE_TOKEN_ENV.to_string());
    let remote_auth_token = resolve_env(&token_var);

    if read_str_at(config_json, "/remote/base_url").is_some() && remote_auth_token.is_none() {
        bail!(
            "SECRETS_MISSING: remote.base_url is configured but env var '{}' \
             (remote auth token) is not set or empty",
            token_var,
        );
    }

    Ok(ResolvedSecrets { remote_auth_token })
}
