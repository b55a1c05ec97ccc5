//! Signing keys for certificate issuance
//!
//! Certificates are signed with Ed25519. The issuer only sees the opaque
//! [`CertificateSigner`] capability; [`KeyPair`] is the production signer.
//!
//! Key types:
//! - `KeyPair`: Ed25519 key pair held by the service for its lifetime
//! - `PublicKey`: Ed25519 public key, published for certificate verification
//! - `PublishedKey`: the JSON shape of the public key in the discovery document

use crate::error::{Result, TrustError};
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Algorithm name used in certificate headers and the discovery document
pub const ED25519_ALG: &str = "Ed25519";

/// Opaque signing capability used by the certificate issuer
pub trait CertificateSigner: Send + Sync {
    /// Algorithm name placed in the certificate header
    fn algorithm(&self) -> &'static str;

    /// Sign the given bytes
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Ed25519 key pair for signing certificates
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &URL_SAFE_NO_PAD.encode(self.verifying_key.to_bytes()))
            .field("signing_key", &"[redacted]")
            .finish()
    }
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Create a key pair from an existing signing key
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create a key pair from a raw 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    /// Create a key pair from a base64-encoded seed (as stored in a key file)
    pub fn from_base64_seed(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| TrustError::KeyProvisioning(format!("invalid key encoding: {}", e)))?;
        let seed: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            TrustError::KeyProvisioning(format!("invalid key length: expected 32 bytes, got {}", b.len()))
        })?;
        Ok(Self::from_seed(&seed))
    }

    /// Base64-encoded seed, the inverse of [`KeyPair::from_base64_seed`]
    pub fn to_base64_seed(&self) -> String {
        STANDARD.encode(self.signing_key.to_bytes())
    }

    /// Get the public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.verifying_key,
        }
    }

    /// Get the raw verifying key bytes
    pub fn verifying_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }
}

impl CertificateSigner for KeyPair {
    fn algorithm(&self) -> &'static str {
        ED25519_ALG
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature = self.signing_key.try_sign(message)?;
        Ok(signature.to_bytes().to_vec())
    }
}

/// Ed25519 public key for certificate verification
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PublicKey")
            .field(&URL_SAFE_NO_PAD.encode(self.verifying_key.to_bytes()))
            .finish()
    }
}

impl PublicKey {
    /// Create a public key from raw bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let verifying_key = VerifyingKey::from_bytes(bytes)
            .map_err(|e| TrustError::Input(format!("invalid public key: {}", e)))?;
        Ok(Self { verifying_key })
    }

    /// Get the raw verifying key bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Verify a detached signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature_bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| TrustError::Signing("invalid signature length".into()))?;
        let signature = Signature::from_bytes(&signature_bytes);
        self.verifying_key
            .verify(message, &signature)
            .map_err(|e| TrustError::Signing(e.to_string()))
    }

    /// The form published in the discovery document
    pub fn published(&self) -> PublishedKey {
        PublishedKey {
            algorithm: ED25519_ALG.to_string(),
            public_key: URL_SAFE_NO_PAD.encode(self.to_bytes()),
        }
    }
}

/// Serializable public key for the discovery document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedKey {
    /// Signature algorithm
    pub algorithm: String,
    /// Base64url-encoded public key bytes
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

impl TryFrom<&PublishedKey> for PublicKey {
    type Error = TrustError;

    fn try_from(published: &PublishedKey) -> Result<Self> {
        if published.algorithm != ED25519_ALG {
            return Err(TrustError::Input(format!(
                "unsupported key algorithm: {}",
                published.algorithm
            )));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(&published.public_key)
            .map_err(|e| TrustError::Input(format!("invalid key encoding: {}", e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TrustError::Input("invalid key length".into()))?;
        PublicKey::from_bytes(&bytes)
    }
}
