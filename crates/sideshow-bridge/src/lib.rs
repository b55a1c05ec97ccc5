//! Federated Verification Bridge
//!
//! Delegates "does this user own this email address?" to an external
//! identity provider and reports the answer as a
//! [`VerificationOutcome`](sideshow_core::VerificationOutcome).
//!
//! ## Architecture
//!
//! Verifiers implement [`FederatedVerifier`], a stateless two-step exchange:
//!
//! - **initiate**: build the URL that sends the user to the provider
//! - **verify**: check what the provider sent the user back with
//!
//! Implementations:
//!
//! - **OpenID 2.0**: stateless relying party with attribute exchange for the
//!   email address, confirmed through `check_authentication`
//! - **Mock**: for testing purposes
//!
//! ## Usage
//!
//! ```ignore
//! use sideshow_bridge::{handlers::*, FederatedVerifier};
//!
//! let verifier = OpenIdVerifier::new(OpenIdConfig::new(
//!     "https://www.google.com/accounts/o8/id",
//!     "https://sideshow.example.org/authenticate/verify",
//! ))?;
//!
//! let redirect = verifier.initiate("alice@gmail.com").await?;
//! // ... provider redirects back ...
//! let outcome = verifier.verify(&callback_params).await;
//! ```

pub mod error;
pub mod handlers;
pub mod verifier;

pub use error::{BridgeError, Result};
pub use reqwest::Url;
pub use verifier::{FederatedVerifier, LoggingVerifier};
