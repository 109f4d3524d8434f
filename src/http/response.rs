//! Wire body shapes shared across handlers and middleware.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// The error envelope every failure response carries.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

pub fn error_response(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: kind,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Body of the local health probe. Independent of upstream state.
#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub service: &'static str,
    pub time: String,
}

impl HealthBody {
    pub fn current() -> Self {
        Self {
            status: "healthy",
            service: "gateway",
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_body_shape() {
        let body = HealthBody::current();
        assert_eq!(body.status, "healthy");
        assert_eq!(body.service, "gateway");
        // ISO-8601 UTC with a Z suffix.
        assert!(body.time.ends_with('Z'), "time: {}", body.time);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "gateway");
    }

    #[test]
    fn error_body_serializes_kind_and_message() {
        let body = ErrorBody {
            error: "unauthorized",
            message: "Authorization header is required".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "unauthorized");
        assert_eq!(json["message"], "Authorization header is required");
    }
}
