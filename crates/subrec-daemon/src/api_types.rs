//! Request and response types for all subrec-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests.  No business logic lives here.

use serde::{Deserialize, Serialize};
use subrec_reconcile::{BillingPurchaseResult, EntitlementTier, SubscriberCategory};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// /v1/entitlement/:category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementResponse {
    pub category: SubscriberCategory,
    pub tier: EntitlementTier,
    pub mismatch_detected: bool,
}

// ---------------------------------------------------------------------------
// /v1/reconcile/:category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileAcceptedResponse {
    pub category: SubscriberCategory,
    /// false = a pass for this category was already in flight.
    pub accepted: bool,
}

// ---------------------------------------------------------------------------
// /v1/network
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkResponse {
    pub available: bool,
}

// ---------------------------------------------------------------------------
// /v1/account
// ---------------------------------------------------------------------------

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountRequest {
    #[serde(default)]
    pub registered: Option<bool>,
    #[serde(default)]
    pub remote_backups_enabled: Option<bool>,
    #[serde(default)]
    pub backups_enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResponse {
    pub registered: bool,
    pub remote_backups_enabled: bool,
    pub backups_enabled: bool,
}

// ---------------------------------------------------------------------------
// /v1/billing/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingAvailabilityRequest {
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingStateResponse {
    pub available: bool,
    pub purchase: BillingPurchaseResult,
}
