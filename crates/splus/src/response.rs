use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// An empty `204 No Content` response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

/// A handler result that may be absent. `None` becomes `204 No Content`.
///
/// ```rust
/// use splus::MaybeResponse;
///
/// async fn find(id: u32) -> MaybeResponse<String> {
///     (id == 1).then(|| "found".to_owned()).into()
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaybeResponse<R>(pub Option<R>);

impl<R> From<Option<R>> for MaybeResponse<R> {
    fn from(value: Option<R>) -> Self {
        Self(value)
    }
}

impl<R: IntoResponse> IntoResponse for MaybeResponse<R> {
    fn into_response(self) -> Response {
        match self.0 {
            Some(response) => response.into_response(),
            None => NoContent.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_no_content() {
        let response = MaybeResponse::<String>(None).into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_some_is_forwarded() {
        let response = MaybeResponse(Some((StatusCode::CREATED, "made"))).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
