//! Common types shared between the trust core and the verification adapter

use serde::{Deserialize, Serialize};

/// Result of checking a federated provider's assertion
///
/// Produced by the verification adapter and consumed once by
/// [`TrustState::complete_verification`](crate::trust::TrustState::complete_verification).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum VerificationOutcome {
    /// The user backed out at the provider
    Cancelled,
    /// The assertion failed validation or carried no authenticated email
    Failed { reason: String },
    /// The provider vouched for this email address
    Verified { email: String },
}

impl VerificationOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        VerificationOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn verified(email: impl Into<String>) -> Self {
        VerificationOutcome::Verified {
            email: email.into(),
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified { .. })
    }
}

/// Non-error result of completing a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// The claimed email is now proven
    Proven,
    /// The user cancelled; nothing changed
    NotCompleted,
}

impl std::fmt::Display for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Completion::Proven => write!(f, "proven"),
            Completion::NotCompleted => write!(f, "not_completed"),
        }
    }
}
