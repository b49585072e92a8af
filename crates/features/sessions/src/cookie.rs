use crate::error::{SessionError, SessionErrorExt};
use crate::signer::Signer;
use axum::http::{HeaderMap, header};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use splus_domain::config::SameSite;
use std::time::Duration;

/// What the session cookie carries: a pointer into storage and its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookiePayload {
    #[serde(rename = "_session_secret_key")]
    pub key: String,
    pub expiry: DateTime<Utc>,
}

impl CookiePayload {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expiry <= Utc::now()
    }

    /// `standard_b64(sign(json))`.
    ///
    /// # Errors
    /// Returns [`SessionError::Serialization`] if the payload cannot be serialized.
    pub fn encode(&self, signer: &Signer) -> Result<String, SessionError> {
        let json = serde_json::to_string(self).context("Encoding session cookie")?;
        Ok(STANDARD.encode(signer.sign(&json)))
    }

    /// # Errors
    /// Fails when the value is not base64, the signature does not verify, or the
    /// signed value is not a payload.
    pub fn decode(value: &str, signer: &Signer) -> Result<Self, SessionError> {
        let raw = STANDARD.decode(value).context("Decoding session cookie")?;
        let signed = String::from_utf8(raw).map_err(|_| SessionError::BadSignature {
            message: "Cookie is not valid UTF-8".into(),
            context: None,
        })?;

        let json = signer.unsign(&signed)?;
        serde_json::from_str(json).context("Parsing session cookie")
    }
}

/// Renders `Set-Cookie` values for the session cookie.
#[derive(Debug, Clone)]
pub struct CookieAttributes {
    pub name: String,
    pub max_age: Duration,
    pub same_site: SameSite,
    pub secure: bool,
}

impl CookieAttributes {
    fn flags(&self) -> String {
        let secure = if self.secure { "; secure" } else { "" };
        format!("HttpOnly; SameSite={}; Path=/{secure}", self.same_site)
    }

    #[must_use]
    pub fn set(&self, value: &str) -> String {
        format!("{}={value}; {}; Max-Age={}", self.name, self.flags(), self.max_age.as_secs())
    }

    /// A cookie telling the browser to drop the session.
    #[must_use]
    pub fn clear(&self) -> String {
        format!("{}=null; {}; Max-Age=0", self.name, self.flags())
    }
}

/// Value of the first cookie named `name` across all `Cookie` headers.
#[must_use]
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}
