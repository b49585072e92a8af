use std::borrow::Cow;

/// A specialized [`RedisError`] enum of this crate.
#[splus_derive::splus_error]
pub enum RedisError {
    /// The url could not be parsed into connection info.
    #[error("Invalid Redis url{}: {message}", format_context(.context))]
    InvalidUrl { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Redis client error{}: {source}", format_context(.context))]
    Client { source: redis::RedisError, context: Option<Cow<'static, str>> },

    /// The handle was built outside of a Tokio runtime.
    #[error("Runtime unavailable{}: {message}", format_context(.context))]
    Runtime { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
