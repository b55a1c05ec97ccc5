//! OpenID 2.0 verifier (stateless mode)
//!
//! Sends the user to a single trusted OpenID provider with an attribute
//! exchange request for the email address, then checks the positive
//! assertion by asking the provider directly (`check_authentication`).
//! No association or nonce table is kept; the provider rejects a response it
//! has already confirmed once.

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{header, Url};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use sideshow_core::compare::normalize;
use sideshow_core::VerificationOutcome;

use crate::error::{BridgeError, Result};
use crate::verifier::FederatedVerifier;

pub const OPENID_NS: &str = "http://specs.openid.net/auth/2.0";
pub const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";
pub const SERVER_TYPE: &str = "http://specs.openid.net/auth/2.0/server";
pub const AX_NS: &str = "http://openid.net/srv/ax/1.0";
pub const AX_EMAIL_TYPE: &str = "http://axschema.org/contact/email";
pub const UI_NS: &str = "http://specs.openid.net/extensions/ui/1.0";

const XRDS_CONTENT_TYPE: &str = "application/xrds+xml";

/// Fields of a positive assertion that must be covered by the signature
const REQUIRED_SIGNED: [&str; 4] = ["op_endpoint", "return_to", "response_nonce", "assoc_handle"];

/// Configuration of the trusted provider
#[derive(Debug, Clone)]
pub struct OpenIdConfig {
    /// OP identifier to discover, e.g. `https://www.google.com/accounts/o8/id`
    pub provider: String,

    /// Absolute URL the provider sends the user back to
    pub return_to: String,

    /// Realm presented to the user; the provider defaults it to `return_to`
    pub realm: Option<String>,

    /// Timeout for discovery and direct verification requests
    pub timeout: Duration,
}

impl OpenIdConfig {
    pub fn new(provider: impl Into<String>, return_to: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            return_to: return_to.into(),
            realm: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Stateless OpenID 2.0 relying party for one provider
pub struct OpenIdVerifier {
    config: OpenIdConfig,
    return_to: Url,
    /// Discovered endpoint cache (identifier -> OP endpoint)
    endpoint_cache: Cache<String, String>,
    http_client: reqwest::Client,
}

impl OpenIdVerifier {
    pub fn new(config: OpenIdConfig) -> Result<Self> {
        let return_to = Url::parse(&config.return_to)
            .map_err(|e| BridgeError::InvalidProvider(format!("return_to: {}", e)))?;
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            config,
            return_to,
            endpoint_cache: Cache::builder()
                .time_to_live(Duration::from_secs(3600))
                .max_capacity(16)
                .build(),
            http_client,
        })
    }

    pub fn config(&self) -> &OpenIdConfig {
        &self.config
    }

    /// Resolve the configured identifier to its OP endpoint (with caching)
    pub async fn discover(&self) -> Result<String> {
        let identifier = &self.config.provider;
        if let Some(cached) = self.endpoint_cache.get(identifier).await {
            debug!(identifier = %identifier, "Using cached OP endpoint");
            return Ok(cached);
        }

        let url = Url::parse(identifier).map_err(|e| BridgeError::InvalidProvider(e.to_string()))?;
        debug!(identifier = %identifier, "Discovering OP endpoint");

        let response = self
            .http_client
            .get(url)
            .header(header::ACCEPT, XRDS_CONTENT_TYPE)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| BridgeError::Discovery(e.to_string()))?;

        let location = response
            .headers()
            .get("x-xrds-location")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.text().await?;

        let endpoint = match (parse_xrds(&body), location) {
            (Some(endpoint), _) => endpoint,
            (None, Some(location)) => {
                debug!(location = %location, "Following X-XRDS-Location");
                let body = self
                    .http_client
                    .get(location.as_str())
                    .header(header::ACCEPT, XRDS_CONTENT_TYPE)
                    .send()
                    .await?
                    .error_for_status()
                    .map_err(|e| BridgeError::Discovery(e.to_string()))?
                    .text()
                    .await?;
                parse_xrds(&body).ok_or_else(|| {
                    BridgeError::Discovery("no OpenID 2.0 server endpoint advertised".into())
                })?
            }
            (None, None) => {
                return Err(BridgeError::Discovery(
                    "no OpenID 2.0 server endpoint advertised".into(),
                ))
            }
        };

        Url::parse(&endpoint).map_err(|e| BridgeError::Discovery(format!("endpoint: {}", e)))?;
        self.endpoint_cache.insert(identifier.clone(), endpoint.clone()).await;
        Ok(endpoint)
    }

    /// Build the `checkid_setup` redirect for `endpoint`
    fn authentication_url(&self, endpoint: &str) -> Result<Url> {
        let mut url = Url::parse(endpoint).map_err(|e| BridgeError::InvalidProvider(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("openid.ns", OPENID_NS)
                .append_pair("openid.mode", "checkid_setup")
                .append_pair("openid.return_to", self.return_to.as_str())
                .append_pair("openid.claimed_id", IDENTIFIER_SELECT)
                .append_pair("openid.identity", IDENTIFIER_SELECT);
            if let Some(realm) = &self.config.realm {
                query.append_pair("openid.realm", realm);
            }
            query
                .append_pair("openid.ns.ax", AX_NS)
                .append_pair("openid.ax.mode", "fetch_request")
                .append_pair("openid.ax.type.email", AX_EMAIL_TYPE)
                .append_pair("openid.ax.required", "email")
                .append_pair("openid.ns.ui", UI_NS)
                .append_pair("openid.ui.mode", "popup");
        }
        Ok(url)
    }

    /// Validate a positive assertion and return the email it vouches for
    async fn check_assertion(&self, params: &HashMap<String, String>) -> Result<String> {
        let field = |name: &str| params.get(&format!("openid.{}", name)).map(String::as_str);

        if field("ns") != Some(OPENID_NS) {
            return Err(BridgeError::Protocol("not an OpenID 2.0 response".into()));
        }
        match field("mode") {
            Some("id_res") => {}
            Some(mode) => return Err(BridgeError::Protocol(format!("unexpected mode '{}'", mode))),
            None => return Err(BridgeError::Protocol("missing openid.mode".into())),
        }

        let return_to = field("return_to")
            .ok_or_else(|| BridgeError::Protocol("missing return_to".into()))?;
        if !same_location(return_to, &self.return_to) {
            return Err(BridgeError::Protocol(format!(
                "return_to '{}' does not point at this service",
                return_to
            )));
        }

        let endpoint = self.discover().await?;
        let op_endpoint = field("op_endpoint")
            .ok_or_else(|| BridgeError::Protocol("missing op_endpoint".into()))?;
        if op_endpoint != endpoint {
            return Err(BridgeError::Protocol(format!(
                "assertion from untrusted endpoint '{}'",
                op_endpoint
            )));
        }

        if field("claimed_id").is_none() {
            return Err(BridgeError::Protocol("assertion has no claimed identifier".into()));
        }
        if field("response_nonce").is_none() {
            return Err(BridgeError::Protocol("missing response_nonce".into()));
        }

        let signed: Vec<&str> = field("signed")
            .ok_or_else(|| BridgeError::Protocol("missing openid.signed".into()))?
            .split(',')
            .collect();
        let mut must_be_signed: Vec<&str> = REQUIRED_SIGNED.to_vec();
        must_be_signed.extend(["claimed_id", "identity"].into_iter().filter(|f| field(*f).is_some()));
        for name in must_be_signed {
            if !signed.contains(&name) {
                return Err(BridgeError::UnsignedField(name.to_string()));
            }
        }

        let email = ax_email(params, &signed)?;
        if normalize(&email).is_none() {
            return Err(BridgeError::NoEmail);
        }

        self.check_authentication(op_endpoint, params).await?;
        Ok(email)
    }

    /// Ask the provider to confirm the signature of the assertion
    async fn check_authentication(
        &self,
        op_endpoint: &str,
        params: &HashMap<String, String>,
    ) -> Result<()> {
        let mut form: Vec<(&str, &str)> = params
            .iter()
            .filter(|(k, _)| k.starts_with("openid.") && k.as_str() != "openid.mode")
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        form.push(("openid.mode", "check_authentication"));

        let body = self
            .http_client
            .post(op_endpoint)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let response = parse_key_values(&body);
        match response.get("is_valid").map(String::as_str) {
            Some("true") => Ok(()),
            _ => Err(BridgeError::Rejected(
                response
                    .get("error")
                    .cloned()
                    .unwrap_or_else(|| "is_valid:false".into()),
            )),
        }
    }
}

#[async_trait]
impl FederatedVerifier for OpenIdVerifier {
    fn description(&self) -> &str {
        "OpenID 2.0 stateless verifier"
    }

    async fn initiate(&self, claimed_email: &str) -> Result<Url> {
        if normalize(claimed_email).is_none() {
            return Err(BridgeError::MissingEmail);
        }
        let endpoint = self.discover().await?;
        self.authentication_url(&endpoint)
    }

    async fn verify(&self, params: &HashMap<String, String>) -> VerificationOutcome {
        if params.get("openid.mode").map(String::as_str) == Some("cancel") {
            return VerificationOutcome::Cancelled;
        }
        match self.check_assertion(params).await {
            Ok(email) => VerificationOutcome::verified(email),
            Err(e) => VerificationOutcome::failed(e.to_string()),
        }
    }
}

/// Compare two URLs ignoring their query and fragment
fn same_location(candidate: &str, expected: &Url) -> bool {
    match Url::parse(candidate) {
        Ok(url) => {
            url.scheme() == expected.scheme()
                && url.host_str() == expected.host_str()
                && url.port_or_known_default() == expected.port_or_known_default()
                && url.path() == expected.path()
        }
        Err(_) => false,
    }
}

/// Find the signed attribute-exchange email in an assertion.
///
/// The namespace declaration, the type mapping and the value all have to be
/// covered by the signature. Aliases and type names are tried in sorted
/// order so the result does not depend on parameter order.
fn ax_email(params: &HashMap<String, String>, signed: &[&str]) -> Result<String> {
    let mut aliases: Vec<&str> = params
        .iter()
        .filter(|(_, v)| v.as_str() == AX_NS)
        .filter_map(|(k, _)| k.strip_prefix("openid.ns."))
        .collect();
    aliases.sort_unstable();

    let mut unsigned: Option<String> = None;
    let mut note_unsigned = |field: String| {
        if unsigned.is_none() {
            unsigned = Some(field);
        }
    };

    for alias in aliases {
        let ns_field = format!("ns.{}", alias);
        if !signed.contains(&ns_field.as_str()) {
            note_unsigned(ns_field);
            continue;
        }

        let type_prefix = format!("openid.{}.type.", alias);
        let mut names: Vec<&str> = params
            .iter()
            .filter(|(_, v)| v.as_str() == AX_EMAIL_TYPE)
            .filter_map(|(k, _)| k.strip_prefix(type_prefix.as_str()))
            .collect();
        names.sort_unstable();

        for name in names {
            let type_field = format!("{}.type.{}", alias, name);
            if !signed.contains(&type_field.as_str()) {
                note_unsigned(type_field);
                continue;
            }
            let candidates = [
                format!("{}.value.{}", alias, name),
                format!("{}.value.{}.1", alias, name),
            ];
            for value_field in candidates {
                if let Some(email) = params.get(&format!("openid.{}", value_field)) {
                    if signed.contains(&value_field.as_str()) {
                        return Ok(email.clone());
                    }
                    note_unsigned(value_field);
                }
            }
        }
    }

    Err(unsigned.map_or(BridgeError::NoEmail, BridgeError::UnsignedField))
}

/// Parse an OpenID key-value form response (`key:value` per line)
fn parse_key_values(body: &str) -> HashMap<String, String> {
    body.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Extract the OP endpoint from an XRDS document.
///
/// Picks the first `<Service>` advertising the OpenID 2.0 server type.
///
/// This is a scanner for the flat documents providers actually serve, not
/// an XML parser: elements must use the default namespace (no `xrd:`
/// prefix), CDATA sections are not recognised and only the five predefined
/// entities are decoded. A document outside that shape yields no endpoint
/// and discovery fails.
fn parse_xrds(document: &str) -> Option<String> {
    element_texts(document, "Service").into_iter().find_map(|service| {
        let is_server = element_texts(service, "Type")
            .iter()
            .any(|t| *t == SERVER_TYPE);
        if !is_server {
            return None;
        }
        element_texts(service, "URI")
            .first()
            .map(|uri| decode_entities(uri))
    })
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Trimmed inner text of every `<tag ...>...</tag>` element in `xml`
fn element_texts<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut texts = Vec::new();
    let mut rest = xml;

    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        // <Types> must not match <Type
        match after.chars().next() {
            Some(c) if c == '>' || c.is_whitespace() => {}
            Some(_) => {
                rest = after;
                continue;
            }
            None => break,
        }
        let Some(gt) = after.find('>') else { break };
        let body = &after[gt + 1..];
        let Some(end) = body.find(&close) else { break };
        texts.push(body[..end].trim());
        rest = &body[end + close.len()..];
    }
    texts
}
