//! HTTP client for the remote subscription server.
//!
//! Endpoints (relative to `base_url`):
//! - `GET /v1/subscription/{category}` -> `ActiveSubscription` JSON, or 404
//!   when the account has no subscription in that category.
//! - `GET /v1/entitlement/tier`        -> `{ "tier": "PAID" }`
//!
//! The bearer token is resolved by the caller from the env var named in
//! config; it is never logged.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use subrec_reconcile::{ActiveSubscription, EntitlementTier, SubscriberCategory};
use subrec_runtime::SubscriptionClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct TierBody {
    tier: EntitlementTier,
}

#[derive(Clone)]
pub struct HttpSubscriptionClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl std::fmt::Debug for HttpSubscriptionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSubscriptionClient")
            .field("base_url", &self.base_url)
            .field("auth_token", &"<REDACTED>")
            .finish()
    }
}

impl HttpSubscriptionClient {
    pub fn new(base_url: String, auth_token: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build subscription http client failed")?;
        Ok(Self {
            http,
            base_url,
            auth_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait::async_trait]
impl SubscriptionClient for HttpSubscriptionClient {
    async fn active_subscription(
        &self,
        category: SubscriberCategory,
    ) -> Result<Option<ActiveSubscription>> {
        let resp = self
            .http
            .get(self.url(&format!("/v1/subscription/{category}")))
            .bearer_auth(&self.auth_token)
            .send()
            .await
            .context("subscription request failed")?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow!(
                "subscription http error status={} category={category}",
                status.as_u16()
            ));
        }

        let view: ActiveSubscription = resp
            .json()
            .await
            .context("subscription response json decode failed")?;
        if view.category != category {
            return Err(anyhow!(
                "subscription response category mismatch: asked={category} got={}",
                view.category
            ));
        }
        Ok(Some(view))
    }

    async fn tier(&self) -> Result<EntitlementTier> {
        let resp = self
            .http
            .get(self.url("/v1/entitlement/tier"))
            .bearer_auth(&self.auth_token)
            .send()
            .await
            .context("tier request failed")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("tier http error status={}", status.as_u16()));
        }

        let body: TierBody = resp
            .json()
            .await
            .context("tier response json decode failed")?;
        Ok(body.tier)
    }
}

/// Stand-in used when no remote base URL is configured. Every query fails,
/// which the job absorbs: the cached tier is kept and no subscription is
/// assumed active.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredSubscriptionClient;

#[async_trait::async_trait]
impl SubscriptionClient for UnconfiguredSubscriptionClient {
    async fn active_subscription(
        &self,
        _category: SubscriberCategory,
    ) -> Result<Option<ActiveSubscription>> {
        Err(anyhow!("remote subscription server not configured"))
    }

    async fn tier(&self) -> Result<EntitlementTier> {
        Err(anyhow!("remote subscription server not configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> HttpSubscriptionClient {
        HttpSubscriptionClient::new(server.base_url(), "test-token".to_string()).unwrap()
    }

    #[tokio::test]
    async fn fetches_active_subscription_with_bearer_token() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/subscription/backup")
                    .header("authorization", "Bearer test-token");
                then.status(200).json_body(json!({
                    "category": "backup",
                    "is_active": true,
                    "ends_at": "2026-04-15T00:00:00Z",
                    "will_cancel_at_period_end": false
                }));
            })
            .await;

        let view = client(&server)
            .active_subscription(SubscriberCategory::Backup)
            .await
            .unwrap()
            .unwrap();
        m.assert_async().await;
        assert!(view.is_active);
        assert_eq!(view.category, SubscriberCategory::Backup);
        assert!(view.ends_at.is_some());
    }

    #[tokio::test]
    async fn not_found_means_no_subscription() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/subscription/donation");
                then.status(404);
            })
            .await;

        let view = client(&server)
            .active_subscription(SubscriberCategory::Donation)
            .await
            .unwrap();
        assert!(view.is_none());
    }

    #[tokio::test]
    async fn server_error_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/subscription/backup");
                then.status(503);
            })
            .await;

        let err = client(&server)
            .active_subscription(SubscriberCategory::Backup)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("status=503"), "{err}");
    }

    #[tokio::test]
    async fn tier_is_decoded() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/entitlement/tier")
                    .header("authorization", "Bearer test-token");
                then.status(200).json_body(json!({ "tier": "PAID" }));
            })
            .await;

        assert_eq!(client(&server).tier().await.unwrap(), EntitlementTier::Paid);
    }

    #[tokio::test]
    async fn malformed_tier_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/entitlement/tier");
                then.status(200).json_body(json!({ "tier": "PLATINUM" }));
            })
            .await;

        assert!(client(&server).tier().await.is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let c = HttpSubscriptionClient::new("http://x".into(), "s3cret".into()).unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("s3cret"));
    }
}
