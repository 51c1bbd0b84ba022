//! Admin Package Lambda - Issues a free multi-lesson package to a customer.
//!
//! Endpoint:
//! - POST /create-free-admin-package

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::http::{preflight, respond};
use shared::promo::{issue_admin_package, AdminPackageRequest};
use shared::{parse_body, AppState};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    if let Some(response) = preflight(&event)? {
        return Ok(response);
    }

    let request: AdminPackageRequest = parse_body!(event.body());

    let result = issue_admin_package(state.store.as_ref(), request).await;
    respond(result, "Failed to create admin free package")
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
