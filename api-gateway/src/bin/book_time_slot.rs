//! Book Time Slot Lambda - Reserves a lesson against a package.
//!
//! Endpoint:
//! - POST /book-time-slot

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::booking::{book_time_slot, BookTimeSlotRequest};
use shared::http::{preflight, respond};
use shared::{parse_body, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    if let Some(response) = preflight(&event)? {
        return Ok(response);
    }

    let request: BookTimeSlotRequest = parse_body!(event.body());
    info!(
        package_code = ?request.package_code,
        time_slot_id = ?request.time_slot_id,
        "Processing booking"
    );

    let result = book_time_slot(state.store.as_ref(), state.notifier(), request).await;
    respond(result, "Failed to book time slot")
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::from_env().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
