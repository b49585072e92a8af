//! # splus demo
//!
//! A small application showing views, route limits and sessions.
//!
//! | Path           | Notes                                   |
//! |----------------|-----------------------------------------|
//! | `/`            | limited to one request per minute       |
//! | `/api/random`  | [`ApiView`] route under the `api` prefix |
//! | `/test`        | [`ApiView`] route without the prefix    |
//! | `/visits`      | session backed counter                  |
//! | `/visits/reset`| clears the session, 204 if it was empty |

mod views;

pub use crate::views::ApiView;

use axum::Json;
use serde_json::{Value, json};
use splus::config::AppConfig;
use splus::types::Limit;
use splus::{AppError, Application, ApplicationBuilder, MaybeResponse, Redis, Route, Session};
use std::time::Duration;

const HOME_LIMIT: Limit = Limit::new(1, Duration::from_secs(60));

/// Builds the demo application. Rate limiting and sessions are always on.
///
/// # Errors
/// Returns an [`AppError`] if a configured limit or the session setup is invalid.
pub fn application(mut cfg: AppConfig, redis: Option<&Redis>) -> Result<Application, AppError> {
    cfg.ratelimit.enabled = true;
    cfg.session.enabled = true;

    ApplicationBuilder::from_config(&cfg, redis)?
        .name("App")
        .route(Route::get("/", home).name("home").limit(HOME_LIMIT))
        .route(Route::get("/visits", visits).name("visits"))
        .route(Route::get("/visits/reset", reset).name("reset"))
        .view(ApiView::default())
        .build()
}

async fn home() -> Json<Value> {
    Json(json!({ "message": "Hello, World!" }))
}

async fn visits(session: Session) -> Result<String, AppError> {
    let count = session.get::<u64>("visits").unwrap_or(0) + 1;
    session.insert("visits", count).map_err(AppError::from)?;
    Ok(format!("You have visited {count} time(s)"))
}

async fn reset(session: Session) -> MaybeResponse<&'static str> {
    let had_visits = !session.is_empty();
    session.clear();
    had_visits.then_some("Session cleared").into()
}
