use std::borrow::Cow;

/// A specialized [`SessionError`] enum of this crate.
#[splus_derive::splus_error]
pub enum SessionError {
    /// The cookie signature does not match its value.
    #[error("Bad signature{}: {message}", format_context(.context))]
    BadSignature { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Cookie decoding error{}: {source}", format_context(.context))]
    Decode { source: base64::DecodeError, context: Option<Cow<'static, str>> },

    #[error("Session serialization error{}: {source}", format_context(.context))]
    Serialization { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Session storage error{}: {source}", format_context(.context))]
    Redis { source: redis::RedisError, context: Option<Cow<'static, str>> },

    #[error("Internal session error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
