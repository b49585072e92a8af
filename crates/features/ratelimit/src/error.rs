use std::borrow::Cow;

/// A specialized [`RatelimitError`] enum of this crate.
#[splus_derive::splus_error]
pub enum RatelimitError {
    /// A limit with a zero rate or a zero period.
    #[error("Invalid limit{}: {message}", format_context(.context))]
    InvalidLimit { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Redis store error{}: {source}", format_context(.context))]
    Redis { source: redis::RedisError, context: Option<Cow<'static, str>> },
}
