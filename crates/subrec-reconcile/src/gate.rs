//! Gating preconditions.
//!
//! A pass is only meaningful when the account is registered, the feature is
//! enabled both remotely and locally, and the billing provider is reachable on
//! this platform. Conditions are evaluated in a fixed order and the first
//! failing one wins; a gated pass always clears the mismatch flag.
//!
//! Billing availability is the last gate and requires a client call, so it is
//! evaluated by the runtime only after [`check_account_gates`] passes.

use serde::{Deserialize, Serialize};

/// Why a pass was short-circuited before taking the category lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateBlock {
    /// Local account is not registered with the server.
    Unregistered,
    /// Feature disabled by remote configuration.
    RemoteFeatureDisabled,
    /// User has not enabled the feature locally.
    LocalFeatureDisabled,
    /// Billing provider API unavailable on this platform.
    BillingUnavailable,
}

impl GateBlock {
    pub fn as_str(self) -> &'static str {
        match self {
            GateBlock::Unregistered => "unregistered",
            GateBlock::RemoteFeatureDisabled => "remote_feature_disabled",
            GateBlock::LocalFeatureDisabled => "local_feature_disabled",
            GateBlock::BillingUnavailable => "billing_unavailable",
        }
    }
}

/// Ambient flags read before any client call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountGateInputs {
    pub registered: bool,
    pub remote_feature_enabled: bool,
    pub local_feature_enabled: bool,
}

/// Evaluate the account-level gates in order.
///
/// Returns the first failing gate, or `None` when all pass.
pub fn check_account_gates(inputs: &AccountGateInputs) -> Option<GateBlock> {
    if !inputs.registered {
        return Some(GateBlock::Unregistered);
    }
    if !inputs.remote_feature_enabled {
        return Some(GateBlock::RemoteFeatureDisabled);
    }
    if !inputs.local_feature_enabled {
        return Some(GateBlock::LocalFeatureDisabled);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> AccountGateInputs {
        AccountGateInputs {
            registered: true,
            remote_feature_enabled: true,
            local_feature_enabled: true,
        }
    }

    #[test]
    fn all_open_passes() {
        assert_eq!(check_account_gates(&open()), None);
    }

    #[test]
    fn first_failing_gate_wins() {
        let all_closed = AccountGateInputs {
            registered: false,
            remote_feature_enabled: false,
            local_feature_enabled: false,
        };
        assert_eq!(
            check_account_gates(&all_closed),
            Some(GateBlock::Unregistered)
        );

        let mut remote_and_local = open();
        remote_and_local.remote_feature_enabled = false;
        remote_and_local.local_feature_enabled = false;
        assert_eq!(
            check_account_gates(&remote_and_local),
            Some(GateBlock::RemoteFeatureDisabled)
        );

        let mut local_only = open();
        local_only.local_feature_enabled = false;
        assert_eq!(
            check_account_gates(&local_only),
            Some(GateBlock::LocalFeatureDisabled)
        );
    }
}
