use axum::Json;
use http::StatusCode;
use serde_json::{Value, json};

/// Fallback handler mounted at the dispatch path when no downstream tool
/// router is configured. Gating still applies in front of it, so the
/// full verdict surface stays testable without any tools wired up.
pub(crate) async fn unavailable() -> (StatusCode, Json<Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": "Tool dispatch unavailable",
            "message": "No downstream tool router is configured",
        })),
    )
}
