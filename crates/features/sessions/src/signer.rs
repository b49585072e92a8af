//! HMAC-SHA256 value signing.
//!
//! Signed values look like `value.signature`, with the signature encoded as
//! unpadded url-safe base64. The signing key is derived from the secret the same
//! way `itsdangerous` does by default, so cookies can be shared with services
//! built on that library.

use crate::error::SessionError;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

const SALT: &[u8] = b"itsdangerous.Signer";
const SEPARATOR: char = '.';

#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

impl Signer {
    /// # Errors
    /// Returns [`SessionError::Internal`] if the derived key is rejected by HMAC.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SessionError> {
        let key = Sha256::new()
            .chain_update(SALT)
            .chain_update(b"signer")
            .chain_update(secret.as_ref())
            .finalize();

        let mac = <HmacSha256 as Mac>::new_from_slice(&key)
            .map_err(|e| SessionError::from(format!("Failed to key HMAC: {e}")))?;

        Ok(Self { mac })
    }

    #[must_use]
    pub fn signature(&self, value: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    #[must_use]
    pub fn sign(&self, value: &str) -> String {
        format!("{value}{SEPARATOR}{}", self.signature(value))
    }

    /// Verifies `signed` and returns the original value.
    ///
    /// # Errors
    /// Returns [`SessionError::BadSignature`] when the separator is missing or the
    /// signature does not match.
    pub fn unsign<'a>(&self, signed: &'a str) -> Result<&'a str, SessionError> {
        let Some((value, signature)) = signed.rsplit_once(SEPARATOR) else {
            return Err(SessionError::BadSignature {
                message: format!("No \"{SEPARATOR}\" found in value").into(),
                context: None,
            });
        };

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| SessionError::BadSignature {
            message: "Signature is not valid base64".into(),
            context: None,
        })?;

        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        mac.verify_slice(&signature).map_err(|_| SessionError::BadSignature {
            message: "Signature does not match".into(),
            context: None,
        })?;

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_appends_signature() {
        let signer = Signer::new("secret").expect("signer");
        let signed = signer.sign("hello");

        let (value, signature) = signed.rsplit_once('.').expect("separator");
        assert_eq!(value, "hello");
        // 32 bytes of HMAC-SHA256, unpadded base64.
        assert_eq!(signature.len(), 43);
        assert!(!signature.contains('='));
    }

    #[test]
    fn test_unsign_accepts_own_signature() {
        let signer = Signer::new("secret").expect("signer");
        let payload = r#"{"a.b": "c.d"}"#;

        assert_eq!(signer.unsign(&signer.sign(payload)).expect("valid"), payload);
    }

    #[test]
    fn test_unsign_rejects_tampering() {
        let signer = Signer::new("secret").expect("signer");
        let signed = signer.sign("user=1");
        let tampered = signed.replacen("user=1", "user=2", 1);

        assert!(matches!(signer.unsign(&tampered), Err(SessionError::BadSignature { .. })));
    }

    #[test]
    fn test_unsign_rejects_other_secret() {
        let signed = Signer::new("one").expect("signer").sign("value");
        let other = Signer::new("two").expect("signer");

        assert!(other.unsign(&signed).is_err());
    }

    #[test]
    fn test_unsign_requires_separator() {
        let signer = Signer::new("secret").expect("signer");

        assert!(matches!(signer.unsign("nodot"), Err(SessionError::BadSignature { .. })));
        assert!(signer.unsign("value.!!!").is_err());
    }

    #[test]
    fn test_signature_is_deterministic() {
        let a = Signer::new("secret").expect("signer");
        let b = Signer::new("secret").expect("signer");

        assert_eq!(a.sign("value"), b.sign("value"));
    }
}
