//! Verifier implementations

pub mod mock;
pub mod openid;

pub use mock::MockVerifier;
pub use openid::{OpenIdConfig, OpenIdVerifier};
