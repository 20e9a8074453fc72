//! Authorization seam.
//!
//! The engine never decides membership or roles itself. It asks an
//! [`AuthorizationPolicy`] for a yes/no decision with a reason code before
//! every guarded operation. `AllowAllPolicy` is the default.

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a caller was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NotAMember,
    NoPermission,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::NotAMember => write!(f, "not_a_member"),
            DenialReason::NoPermission => write!(f, "no_permission"),
        }
    }
}

/// A policy's answer for one (workspace, caller) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationDecision {
    pub authorized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

impl AuthorizationDecision {
    pub fn allow() -> Self {
        Self {
            authorized: true,
            reason: None,
        }
    }

    pub fn deny(reason: DenialReason) -> Self {
        Self {
            authorized: false,
            reason: Some(reason),
        }
    }

    /// Converts a refusal into [`EngineError::Authorization`]. A refusal
    /// without a reason is reported as `no_permission`.
    pub fn into_result(self, workspace_id: &str) -> EngineResult<()> {
        if self.authorized {
            return Ok(());
        }
        Err(EngineError::Authorization {
            workspace_id: workspace_id.to_string(),
            reason: self.reason.unwrap_or(DenialReason::NoPermission),
        })
    }
}

/// Decides whether `caller` may operate on a workspace's encryption.
#[async_trait]
pub trait AuthorizationPolicy: Send + Sync {
    async fn authorize(&self, workspace_id: &str, caller: &str) -> AuthorizationDecision;
}

/// Authorizes every caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPolicy;

#[async_trait]
impl AuthorizationPolicy for AllowAllPolicy {
    async fn authorize(&self, _workspace_id: &str, _caller: &str) -> AuthorizationDecision {
        AuthorizationDecision::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_serializes_reason_codes() {
        let denied = serde_json::to_value(AuthorizationDecision::deny(DenialReason::NotAMember))
            .unwrap();
        assert_eq!(
            denied,
            serde_json::json!({ "authorized": false, "reason": "not_a_member" })
        );

        let allowed = serde_json::to_value(AuthorizationDecision::allow()).unwrap();
        assert_eq!(allowed, serde_json::json!({ "authorized": true }));
    }

    #[test]
    fn denial_without_reason_defaults_to_no_permission() {
        let decision = AuthorizationDecision {
            authorized: false,
            reason: None,
        };
        let err = decision.into_result("ws").unwrap_err();
        assert_eq!(err.denial_reason(), Some(DenialReason::NoPermission));
    }

    #[tokio::test]
    async fn allow_all_allows() {
        let decision = AllowAllPolicy.authorize("ws", "anyone").await;
        assert!(decision.authorized);
        assert!(decision.into_result("ws").is_ok());
    }
}
