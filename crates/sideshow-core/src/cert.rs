//! Certificate issuance
//!
//! A certificate binds a client public key to an email address for a bounded
//! validity window. It travels in compact form:
//!
//! ```text
//! base64url(header) "." base64url(payload) "." base64url(signature)
//! ```
//!
//! with header `{"alg": ...}` and payload
//! `{"iss", "iat", "exp", "public-key", "principal": {"email"}}`, times in
//! milliseconds since the epoch.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::crypto::{CertificateSigner, PublicKey};
use crate::error::{Result, TrustError};

/// A signed certificate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    /// Compact signed form handed to the client
    #[serde(rename = "cert")]
    pub encoded: String,
    /// Issuer hostname
    pub issuer: String,
    /// Subject email, exactly as requested
    pub email: String,
    /// Subject public key as supplied by the client
    pub public_key: Value,
    /// Start of the validity window
    pub issued_at: DateTime<Utc>,
    /// End of the validity window
    pub expires_at: DateTime<Utc>,
}

impl Certificate {
    /// Length of the validity window
    pub fn validity(&self) -> Duration {
        self.expires_at - self.issued_at
    }

    /// Verify the compact form against `key` and return its payload
    pub fn verify(&self, key: &PublicKey) -> Result<Value> {
        verify_compact(&self.encoded, key)
    }
}

/// Verify a compact certificate and return its decoded payload
pub fn verify_compact(encoded: &str, key: &PublicKey) -> Result<Value> {
    let mut parts = encoded.split('.');
    let (header, payload, signature) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(TrustError::Input("certificate must have three segments".into())),
    };

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|e| TrustError::Input(format!("invalid signature encoding: {}", e)))?;
    key.verify(format!("{}.{}", header, payload).as_bytes(), &signature)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| TrustError::Input(format!("invalid payload encoding: {}", e)))?;
    serde_json::from_slice(&payload)
        .map_err(|e| TrustError::Input(format!("invalid payload JSON: {}", e)))
}

/// Interpret the client-supplied public key.
///
/// Clients send the key either as a JSON object or as a string holding
/// serialized JSON; either way it must end up an object.
pub fn parse_public_key(raw: &Value) -> Result<Value> {
    let parsed = match raw {
        Value::String(text) => serde_json::from_str(text)
            .map_err(|e| TrustError::Input(format!("public key is not valid JSON: {}", e)))?,
        other => other.clone(),
    };
    if !parsed.is_object() {
        return Err(TrustError::Input("public key must be a JSON object".into()));
    }
    Ok(parsed)
}

/// Interpret the client-supplied validity duration in milliseconds.
pub fn parse_duration(raw: &Value) -> Result<f64> {
    raw.as_f64()
        .ok_or_else(|| TrustError::Input("duration must be a number".into()))
}

/// Issues certificates under one hostname with a capped validity window
#[derive(Debug, Clone)]
pub struct CertificateIssuer {
    hostname: String,
    max_duration: Duration,
}

impl CertificateIssuer {
    pub fn new(hostname: impl Into<String>, max_duration: Duration) -> Self {
        Self {
            hostname: hostname.into(),
            max_duration,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// Clamp a requested duration to the configured maximum.
    ///
    /// Negative and non-finite requests are rejected rather than clamped.
    pub fn effective_duration(&self, requested_ms: f64) -> Result<Duration> {
        if !requested_ms.is_finite() || requested_ms < 0.0 {
            return Err(TrustError::Input(format!(
                "duration must be a non-negative number of milliseconds, got {}",
                requested_ms
            )));
        }
        let max_ms = self.max_duration.num_milliseconds();
        let effective_ms = if requested_ms >= max_ms as f64 {
            max_ms
        } else {
            requested_ms as i64
        };
        Ok(Duration::milliseconds(effective_ms))
    }

    /// Sign a certificate valid from now
    pub fn issue(
        &self,
        signer: &dyn CertificateSigner,
        email: &str,
        public_key: &Value,
        requested_ms: f64,
    ) -> Result<Certificate> {
        self.issue_at(signer, email, public_key, requested_ms, Utc::now())
    }

    /// Sign a certificate valid from `now`
    pub fn issue_at(
        &self,
        signer: &dyn CertificateSigner,
        email: &str,
        public_key: &Value,
        requested_ms: f64,
        now: DateTime<Utc>,
    ) -> Result<Certificate> {
        if email.trim().is_empty() {
            return Err(TrustError::Input("email is required".into()));
        }
        let public_key = parse_public_key(public_key)?;
        let duration = self.effective_duration(requested_ms)?;

        let issued_at = now.trunc_subsecs(3);
        let expires_at = issued_at.checked_add_signed(duration).ok_or_else(|| {
            TrustError::Input(format!(
                "certificate would expire beyond the representable date range ({} ms)",
                duration.num_milliseconds()
            ))
        })?;

        let header = json!({ "alg": signer.algorithm() });
        let payload = json!({
            "iss": self.hostname,
            "iat": issued_at.timestamp_millis(),
            "exp": expires_at.timestamp_millis(),
            "public-key": public_key,
            "principal": { "email": email },
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload)?),
        );

        let signature = signer.sign(signing_input.as_bytes()).map_err(|e| {
            warn!(email = %email, error = %e, "Certificate signing failed");
            match e {
                TrustError::Signing(_) => e,
                other => TrustError::Signing(other.to_string()),
            }
        })?;

        debug!(
            email = %email,
            issuer = %self.hostname,
            duration_ms = duration.num_milliseconds(),
            "Signed certificate"
        );

        Ok(Certificate {
            encoded: format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)),
            issuer: self.hostname.clone(),
            email: email.to_string(),
            public_key,
            issued_at,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    struct FailingSigner;

    impl CertificateSigner for FailingSigner {
        fn algorithm(&self) -> &'static str {
            "Ed25519"
        }

        fn sign(&self, _message: &[u8]) -> Result<Vec<u8>> {
            Err(TrustError::Signing("hardware token unplugged".into()))
        }
    }

    fn issuer() -> CertificateIssuer {
        CertificateIssuer::new("sideshow.example.org", Duration::hours(24))
    }

    fn client_key() -> Value {
        json!({ "algorithm": "Ed25519", "publicKey": "abc" })
    }

    #[test]
    fn test_expiry_overflow_is_input_error() {
        let kp = KeyPair::generate();
        let huge = CertificateIssuer::new("sideshow.example.org", Duration::milliseconds(i64::MAX / 2));
        let result = huge.issue(&kp, "a@example.com", &client_key(), f64::MAX);
        assert!(matches!(result, Err(TrustError::Input(_))));
    }

    #[test]
    fn test_duration_clamped_to_max() {
        let kp = KeyPair::generate();
        let cert = issuer().issue(&kp, "a@example.com", &client_key(), 999_999_999.0).unwrap();
        assert_eq!(cert.validity(), Duration::hours(24));
    }

    #[test]
    fn test_shorter_duration_kept() {
        let kp = KeyPair::generate();
        let cert = issuer().issue(&kp, "a@example.com", &client_key(), 60_000.0).unwrap();
        assert_eq!(cert.validity(), Duration::minutes(1));
    }

    #[test]
    fn test_invalid_durations_rejected() {
        let issuer = issuer();
        assert!(matches!(issuer.effective_duration(-1.0), Err(TrustError::Input(_))));
        assert!(matches!(issuer.effective_duration(f64::NAN), Err(TrustError::Input(_))));
        assert!(matches!(issuer.effective_duration(f64::INFINITY), Err(TrustError::Input(_))));
        assert!(matches!(parse_duration(&json!("soon")), Err(TrustError::Input(_))));
    }

    #[test]
    fn test_email_used_verbatim() {
        let kp = KeyPair::generate();
        let cert = issuer().issue(&kp, "Alice@Example.COM", &client_key(), 1000.0).unwrap();
        let payload = cert.verify(&kp.public_key()).unwrap();

        assert_eq!(cert.email, "Alice@Example.COM");
        assert_eq!(payload["principal"]["email"], "Alice@Example.COM");
        assert_eq!(payload["iss"], "sideshow.example.org");
        assert_eq!(payload["public-key"], client_key());
    }

    #[test]
    fn test_payload_window_in_millis() {
        let kp = KeyPair::generate();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let cert = issuer()
            .issue_at(&kp, "a@example.com", &client_key(), 5_000.0, now)
            .unwrap();
        let payload = cert.verify(&kp.public_key()).unwrap();

        assert_eq!(payload["iat"], 1_700_000_000_000i64);
        assert_eq!(payload["exp"], 1_700_000_005_000i64);
    }

    #[test]
    fn test_public_key_as_string() {
        let kp = KeyPair::generate();
        let raw = Value::String(client_key().to_string());
        let cert = issuer().issue(&kp, "a@example.com", &raw, 1000.0).unwrap();
        assert_eq!(cert.public_key, client_key());
    }

    #[test]
    fn test_bad_public_key_rejected() {
        let kp = KeyPair::generate();
        let result = issuer().issue(&kp, "a@example.com", &json!("not json"), 1000.0);
        assert!(matches!(result, Err(TrustError::Input(_))));

        let result = issuer().issue(&kp, "a@example.com", &json!([1, 2]), 1000.0);
        assert!(matches!(result, Err(TrustError::Input(_))));
    }

    #[test]
    fn test_signing_failure_surfaces() {
        let result = issuer().issue(&FailingSigner, "a@example.com", &client_key(), 1000.0);
        assert!(matches!(result, Err(TrustError::Signing(_))));
    }

    #[test]
    fn test_tampered_certificate_rejected() {
        let kp = KeyPair::generate();
        let cert = issuer().issue(&kp, "a@example.com", &client_key(), 1000.0).unwrap();

        let other = issuer().issue(&kp, "b@example.com", &client_key(), 1000.0).unwrap();
        let mut parts: Vec<&str> = cert.encoded.split('.').collect();
        let other_parts: Vec<&str> = other.encoded.split('.').collect();
        parts[1] = other_parts[1];

        assert!(verify_compact(&parts.join("."), &kp.public_key()).is_err());
        assert!(verify_compact("only.two", &kp.public_key()).is_err());
    }
}
