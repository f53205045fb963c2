use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Greeting {
    pub hello: &'static str,
}

// ─── GET /hello ──────────────────────────────────────────────────

pub async fn hello() -> Json<Greeting> {
    Json(Greeting { hello: "world" })
}
