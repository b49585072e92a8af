use splus_ratelimit::RatelimitError;
use splus_sessions::SessionError;
use std::borrow::Cow;

/// A specialized [`AppError`] enum of this crate.
#[splus_derive::splus_error]
pub enum AppError {
    /// Two views share a name.
    #[error("Duplicate view{}: {message}", format_context(.context))]
    DuplicateView { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The same path and method were registered twice.
    #[error("Duplicate route{}: {message}", format_context(.context))]
    DuplicateRoute { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid route{}: {message}", format_context(.context))]
    InvalidRoute { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Rate limiter error{}: {source}", format_context(.context))]
    Ratelimit { source: RatelimitError, context: Option<Cow<'static, str>> },

    #[error("Session error{}: {source}", format_context(.context))]
    Session { source: SessionError, context: Option<Cow<'static, str>> },
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(error = %self, "Request failed");
        axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}
