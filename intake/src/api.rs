use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;
use crate::visitor::VisitorRecord;

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct HelloResponse {
    pub message: String,
}

impl HelloResponse {
    pub fn hello() -> Self {
        HelloResponse {
            message: String::from("Hello"),
        }
    }
}

/// `{success, message}` body shared by the lead and listing endpoints.
#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct VisitorsResponse {
    pub success: bool,
    pub visitors: Vec<VisitorRecord>,
}

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Client IP not found")]
    ClientIpUnavailable,
    #[error("Preview requests are not allowed")]
    PreviewAgent,

    #[error("Name and number are required")]
    MissingLeadFields,
    #[error("failed to parse request: {0}")]
    InvalidBody(String),

    #[error("No visitors found")]
    NoVisitors,

    #[error("document store failure: {0}")]
    Store(#[from] StoreError),
    #[error("visitor queue is closed")]
    QueueClosed,
}

const INTERNAL_ERROR: &str = "Internal Server Error";

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        match self {
            IntakeError::ClientIpUnavailable => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            IntakeError::PreviewAgent => (StatusCode::FORBIDDEN, self.to_string()).into_response(),

            IntakeError::MissingLeadFields | IntakeError::InvalidBody(_) => {
                failure(StatusCode::BAD_REQUEST, self.to_string())
            }
            IntakeError::NoVisitors => failure(StatusCode::NOT_FOUND, self.to_string()),

            IntakeError::Store(err) => {
                tracing::error!("document store failure: {}", err);
                failure(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR.to_string())
            }
            IntakeError::QueueClosed => {
                tracing::error!("internal error: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR).into_response()
            }
        }
    }
}

fn failure(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(StatusResponse {
            success: false,
            message,
        }),
    )
        .into_response()
}
