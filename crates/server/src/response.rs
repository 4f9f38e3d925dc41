//! JSON response envelope.
//!
//! Every handler answers `{ "status": bool, "data"?: T, "message": String }`.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Standard API response body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response carrying data.
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            status: true,
            data: Some(data),
            message: message.into(),
        }
    }
}

impl ApiResponse<()> {
    /// Successful response without data.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: true,
            data: None,
            message: message.into(),
        }
    }

    /// Failed response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: false,
            data: None,
            message: message.into(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape() {
        let body = serde_json::to_value(ApiResponse::success(vec![1, 2], "ok")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "status": true, "data": [1, 2], "message": "ok" })
        );
    }

    #[test]
    fn test_message_omits_data() {
        let body = serde_json::to_value(ApiResponse::message("done")).unwrap();
        assert_eq!(body, serde_json::json!({ "status": true, "message": "done" }));
    }

    #[test]
    fn test_error_shape() {
        let body = serde_json::to_value(ApiResponse::error("nope")).unwrap();
        assert_eq!(body, serde_json::json!({ "status": false, "message": "nope" }));
    }
}
