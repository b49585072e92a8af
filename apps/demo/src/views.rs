use axum::Json;
use rand::Rng;
use serde_json::{Value, json};
use splus::{Route, View};
use std::borrow::Cow;
use std::sync::Arc;

/// Routes under `/api`, plus one that opts out of the prefix.
#[derive(Debug)]
pub struct ApiView {
    some_state: String,
}

impl Default for ApiView {
    fn default() -> Self {
        Self { some_state: "Some cool thing only I know!".to_owned() }
    }
}

impl View for ApiView {
    fn prefix(&self) -> Option<Cow<'_, str>> {
        Some("api".into())
    }

    fn routes(self: Arc<Self>) -> Vec<Route> {
        vec![
            // Full path: /api/random
            Route::get("/random", random_roll).name("random_roll"),
            // Full path: /test
            Route::get("/test", move || async move {
                format!("Hello from ApiView: {}", self.some_state)
            })
            .name("test_route")
            .prefix(false),
        ]
    }
}

async fn random_roll() -> Json<Value> {
    let roll: u32 = rand::rng().random_range(1..=100);
    Json(json!({ "roll": roll }))
}
