//! HTTP helpers for Lambda functions.

use lambda_http::http::Method;
use lambda_http::{Body, Request, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

/// Successful response envelope: `{"success": true, ...data}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Failure response envelope: `{"error": "...", "details": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn builder(status: u16) -> lambda_http::http::response::Builder {
    Response::builder()
        .status(status)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .header("Access-Control-Allow-Methods", "POST, OPTIONS")
        .header("content-type", "application/json")
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>, lambda_http::Error> {
    Ok(builder(status).body(Body::from(serde_json::to_string(data)?))?)
}

/// Create an error response with the given status code and message.
pub fn error_response(
    status: u16,
    message: impl Into<String>,
    details: Option<String>,
) -> Result<Response<Body>, lambda_http::Error> {
    json_response(
        status,
        &ErrorBody {
            error: message.into(),
            details,
        },
    )
}

/// Answer CORS pre-flight and reject anything but POST.
///
/// Returns `Some(response)` when the request must not reach the handler.
pub fn preflight(event: &Request) -> Result<Option<Response<Body>>, lambda_http::Error> {
    let method = event.method();
    if *method == Method::OPTIONS {
        Ok(Some(builder(200).body(Body::Empty)?))
    } else if *method == Method::POST {
        Ok(None)
    } else {
        Ok(Some(error_response(405, "Method not allowed", None)?))
    }
}

/// Turn an operation result into a response.
///
/// Client errors carry their own message; server errors use `failure_message`
/// with the underlying error as `details`.
pub fn respond<T: Serialize>(
    result: crate::Result<T>,
    failure_message: &str,
) -> Result<Response<Body>, lambda_http::Error> {
    match result {
        Ok(data) => json_response(200, &ApiResponse::success(data)),
        Err(e) => {
            let status = e.status_code();
            if status >= 500 {
                error!(error = %e, "{}", failure_message);
                error_response(status, failure_message, e.details())
            } else {
                error_response(status, e.to_string(), e.details())
            }
        }
    }
}

/// Parse request body as JSON, returning a 400 response on failure.
///
/// Returns `Ok(Ok(T))` on successful parse, `Ok(Err(Response))` on parse error (400),
/// or `Err(lambda_http::Error)` on serialization failure.
pub fn parse_json_body<T: DeserializeOwned>(body: &Body) -> Result<Result<T, Response<Body>>, lambda_http::Error> {
    match serde_json::from_slice(body.as_ref()) {
        Ok(parsed) => Ok(Ok(parsed)),
        Err(e) => {
            let response = error_response(400, format!("Invalid request body: {}", e), None)?;
            Ok(Err(response))
        }
    }
}

/// Macro to parse request body, returning early with 400 on parse error.
///
/// Usage:
/// ```ignore
/// let request: MyRequest = parse_body!(event.body());
/// ```
#[macro_export]
macro_rules! parse_body {
    ($body:expr) => {
        match $crate::http::parse_json_body($body)? {
            Ok(parsed) => parsed,
            Err(response) => return Ok(response),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn request(method: &str, body: &str) -> Request {
        lambda_http::http::Request::builder()
            .method(method)
            .uri("/book-time-slot")
            .body(Body::from(body))
            .unwrap()
    }

    fn body_json(response: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    #[test]
    fn test_preflight_options() {
        let response = preflight(&request("OPTIONS", "")).unwrap().unwrap();

        assert_eq!(response.status(), 200);
        assert!(response.body().as_ref().is_empty());
        assert_eq!(
            response.headers()["Access-Control-Allow-Methods"],
            "POST, OPTIONS"
        );
    }

    #[test]
    fn test_preflight_rejects_get() {
        let response = preflight(&request("GET", "")).unwrap().unwrap();

        assert_eq!(response.status(), 405);
        assert_eq!(body_json(&response)["error"], "Method not allowed");
    }

    #[test]
    fn test_preflight_passes_post() {
        assert!(preflight(&request("POST", "{}")).unwrap().is_none());
    }

    #[test]
    fn test_respond_success_flattens_data() {
        let response = respond(
            Ok(serde_json::json!({ "packageCode": "FREE-1-ABCDE" })),
            "Failed to create free package",
        )
        .unwrap();

        assert_eq!(response.status(), 200);
        let body = body_json(&response);
        assert_eq!(body["success"], true);
        assert_eq!(body["packageCode"], "FREE-1-ABCDE");
    }

    #[test]
    fn test_respond_client_error() {
        let response = respond::<()>(Err(Error::SlotFull), "Failed to book time slot").unwrap();

        assert_eq!(response.status(), 400);
        let body = body_json(&response);
        assert_eq!(body["error"], "This time slot is full");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_respond_server_error() {
        let err = Error::Database(sqlx::Error::Protocol("connection reset".to_string()));
        let response = respond::<()>(Err(err), "Failed to book time slot").unwrap();

        assert_eq!(response.status(), 500);
        let body = body_json(&response);
        assert_eq!(body["error"], "Failed to book time slot");
        assert!(body["details"].as_str().unwrap().contains("connection reset"));
    }

    #[test]
    fn test_parse_json_body_rejects_garbage() {
        let parsed = parse_json_body::<serde_json::Value>(&Body::from("{not json")).unwrap();

        let response = parsed.unwrap_err();
        assert_eq!(response.status(), 400);
        assert!(body_json(&response)["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid request body"));
    }
}
