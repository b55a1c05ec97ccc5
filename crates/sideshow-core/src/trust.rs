//! Per-session trust state machine
//!
//! A session moves through three states:
//!
//! ```text
//! Empty ──claim──▶ Claimed ──verified & matching──▶ Proven
//!                    ▲  │                              │
//!                    │  └─cancel / failure / mismatch──┘ (unchanged)
//!                    └──────────── certify ───────────┘
//! ```
//!
//! Every transition is a pure function from the current state to the next
//! one. Callers persist the returned state; on error the session keeps its
//! previous state. A proof authorizes at most one certify attempt.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compare::{emails_match, normalize};
use crate::error::{Result, TrustError};
use crate::types::{Completion, VerificationOutcome};

/// Trust record of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TrustState {
    /// Nothing claimed yet
    #[default]
    Empty,
    /// The user asserted ownership of `claimed`
    Claimed { claimed: String },
    /// The provider verified `proven`, which matched the claim at that time
    Proven { claimed: String, proven: String },
}

impl TrustState {
    /// The most recently claimed email, if any
    pub fn claimed(&self) -> Option<&str> {
        match self {
            TrustState::Empty => None,
            TrustState::Claimed { claimed } | TrustState::Proven { claimed, .. } => {
                Some(claimed.as_str())
            }
        }
    }

    /// The email proven by the provider and not yet consumed, if any
    pub fn proven(&self) -> Option<&str> {
        match self {
            TrustState::Proven { proven, .. } => Some(proven.as_str()),
            _ => None,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            TrustState::Empty => "empty",
            TrustState::Claimed { .. } => "claimed",
            TrustState::Proven { .. } => "proven",
        }
    }

    /// Record a new claimed email.
    ///
    /// Replaces any earlier claim. An outstanding proof survives: it stays
    /// bound to the address that was verified, not to the new claim.
    pub fn claim(&self, email: &str) -> Result<TrustState> {
        if normalize(email).is_none() {
            return Err(TrustError::Input("email is required".into()));
        }
        let claimed = email.to_string();
        Ok(match self {
            TrustState::Proven { proven, .. } => TrustState::Proven {
                claimed,
                proven: proven.clone(),
            },
            _ => TrustState::Claimed { claimed },
        })
    }

    /// Precondition for starting federated verification.
    ///
    /// Returns the claimed email the provider should be asked about.
    pub fn require_claim(&self) -> Result<&str> {
        self.claimed()
            .ok_or_else(|| TrustError::Input("no email has been claimed".into()))
    }

    /// Apply the provider's verdict.
    ///
    /// Cancellation leaves the state untouched and is not an error. A
    /// failure or a mismatch is an error; the caller keeps the old state.
    pub fn complete_verification(
        &self,
        outcome: &VerificationOutcome,
    ) -> Result<(TrustState, Completion)> {
        match outcome {
            VerificationOutcome::Cancelled => Ok((self.clone(), Completion::NotCompleted)),
            VerificationOutcome::Failed { reason } => Err(TrustError::Adapter(reason.clone())),
            VerificationOutcome::Verified { email } => {
                let claimed = self.claimed();
                if !emails_match(claimed, Some(email.as_str())) {
                    return Err(TrustError::Mismatch {
                        claimed: claimed.unwrap_or_default().to_string(),
                        proven: email.clone(),
                    });
                }
                debug!(proven = %email, "Claim verified by provider");
                Ok((
                    TrustState::Proven {
                        claimed: claimed.unwrap_or_default().to_string(),
                        proven: email.clone(),
                    },
                    Completion::Proven,
                ))
            }
        }
    }

    /// Consume the proof for a certify attempt.
    ///
    /// Always returns the next state, which never holds a proof, together
    /// with the authorization verdict for `requested_email`. The verdict is
    /// checked against the proven email only; the current claim plays no
    /// part.
    pub fn consume_proof(&self, requested_email: &str) -> (TrustState, Result<()>) {
        let next = match self {
            TrustState::Empty => TrustState::Empty,
            TrustState::Claimed { claimed } | TrustState::Proven { claimed, .. } => {
                TrustState::Claimed {
                    claimed: claimed.clone(),
                }
            }
        };

        let verdict = if emails_match(Some(requested_email), self.proven()) {
            Ok(())
        } else if self.proven().is_none() {
            Err(TrustError::Authorization("email isn't verified".into()))
        } else {
            Err(TrustError::Authorization(
                "requested email does not match the verified email".into(),
            ))
        };

        (next, verdict)
    }

    /// The email a client may ask a certificate for, if the current claim
    /// has been proven.
    pub fn certifiable_email(&self) -> Option<&str> {
        match self {
            TrustState::Proven { claimed, proven }
                if emails_match(Some(claimed.as_str()), Some(proven.as_str())) =>
            {
                Some(claimed.as_str())
            }
            _ => None,
        }
    }
}
