//! Cancel Booking Lambda - Deletes a customer's booking and restores the lesson.
//!
//! Endpoint:
//! - POST /cancel-booking

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::booking::{cancel_booking, CancelBookingRequest};
use shared::http::{preflight, respond};
use shared::{parse_body, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    if let Some(response) = preflight(&event)? {
        return Ok(response);
    }

    let request: CancelBookingRequest = parse_body!(event.body());
    info!(booking_id = ?request.booking_id, "Processing cancellation");

    let result = cancel_booking(state.store.as_ref(), request).await;
    respond(result, "Failed to cancel booking")
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
