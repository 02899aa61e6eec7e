//! Secret-literal guard.
//!
//! Config names env vars; it never carries credential values. The usual
//! mistake is pasting the remote bearer token or a billing key into
//! `remote.auth_token_env`, so any leaf string shaped like a provider
//! credential aborts the load.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::pointers::leaves;

/// Credential shapes by leading text.
const CREDENTIAL_PREFIXES: &[&str] = &[
    // Stripe (card billing fallback)
    "sk_live",
    "sk_test",
    "rk_live",
    "whsec_",
    "sk-",
    // PEM blocks, e.g. a Play Console service-account key
    "-----BEGIN",
    // Cloud and forge tokens that end up in deploy configs
    "AKIA",
    "ghp_",
    "gho_",
    "glpat-",
    "xoxb-",
    "xoxp-",
];

/// Bearer tokens are long; env var names and URLs that happen to share a
/// prefix with one are not.
const MIN_CREDENTIAL_LEN: usize = 8;

fn is_credential_shaped(s: &str) -> bool {
    let t = s.trim();
    t.len() >= MIN_CREDENTIAL_LEN && CREDENTIAL_PREFIXES.iter().any(|p| t.starts_with(p))
}

/// Reject `config` if any leaf string is credential-shaped. The error names
/// the pointer only.
pub(crate) fn reject_secret_literals(config: &Value) -> Result<()> {
    if let Some(leaf) = leaves(config)
        .into_iter()
        .find(|l| l.value.as_str().is_some_and(is_credential_shaped))
    {
        bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", leaf.pointer);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn env_var_names_pass() {
        let cfg = json!({ "remote": { "auth_token_env": "SUBREC_REMOTE_TOKEN" } });
        assert!(reject_secret_literals(&cfg).is_ok());
    }

    #[test]
    fn pasted_token_is_reported_by_pointer_only() {
        let cfg = json!({ "remote": { "auth_token_env": "sk_live_0123456789" } });
        let err = reject_secret_literals(&cfg).unwrap_err().to_string();
        assert!(err.contains("/remote/auth_token_env"), "{err}");
        assert!(!err.contains("0123456789"), "{err}");
    }

    #[test]
    fn short_prefix_matches_are_not_credentials() {
        assert!(!is_credential_shaped("sk-"));
        assert!(!is_credential_shaped("AKIA"));
    }
}
