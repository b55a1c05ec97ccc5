//! Session cookie handling
//!
//! Browsers are tracked with an opaque random id in the `sideshow_session`
//! cookie. A request without a usable cookie gets a fresh id, and the
//! response sets the cookie.

use axum::{
    extract::FromRequestParts,
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderName, HeaderValue,
    },
    response::AppendHeaders,
};
use std::convert::Infallible;
use uuid::Uuid;

use crate::storage::SessionId;

pub const SESSION_COOKIE: &str = "sideshow_session";

/// Session of the requesting browser
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// The browser did not present a session cookie
    pub is_new: bool,
}

impl Session {
    fn fresh() -> Self {
        Self {
            id: SessionId::generate(),
            is_new: true,
        }
    }

    /// `Set-Cookie` header for a new session, nothing for a known one
    pub fn set_cookie(&self, secure: bool) -> AppendHeaders<Option<(HeaderName, HeaderValue)>> {
        AppendHeaders(self.cookie_header(secure))
    }

    fn cookie_header(&self, secure: bool) -> Option<(HeaderName, HeaderValue)> {
        if !self.is_new {
            return None;
        }
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, self.id
        );
        if secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
            .ok()
            .map(|value| (SET_COOKIE, value))
    }
}

/// Session id from the request's cookies, if one is present and well formed
fn session_from_cookies(parts: &Parts) -> Option<SessionId> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
        .map(|id| SessionId::new(id.to_string()))
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match session_from_cookies(parts) {
            Some(id) => Session { id, is_new: false },
            None => Session::fresh(),
        })
    }
}
