use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;
use uuid::Uuid;

use crate::{application::error::HttpError, cache::EventKind};

use super::HttpState;

/// Publish a product change and drop the affected fragments.
pub(super) async fn product_event(
    State(state): State<HttpState>,
    Path((id, event)): Path<(Uuid, String)>,
) -> Result<StatusCode, HttpError> {
    const SOURCE: &str = "infra::http::invalidation::product_event";

    let kind = match event.as_str() {
        "saved" => EventKind::ProductSaved { product_id: id },
        "deleted" => EventKind::ProductDeleted { product_id: id },
        "created" => EventKind::ProductCreated,
        other => {
            return Err(HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Unknown catalog event",
                format!("unsupported product event `{other}`"),
            ));
        }
    };

    let removed = state.runtime.trigger.trigger(kind, true).await;
    info!(product_id = %id, event = %event, removed, "catalog change applied");
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn flush(State(state): State<HttpState>) -> StatusCode {
    let removed = state.runtime.trigger.flush().await;
    info!(removed, "fragment cache flushed");
    StatusCode::NO_CONTENT
}
