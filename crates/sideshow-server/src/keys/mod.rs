//! Signing key management

mod provider;

pub use provider::{KeyProvider, KeySource};
