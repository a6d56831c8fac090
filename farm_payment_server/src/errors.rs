use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use farm_payment_engine::ReconciliationError;
use log::error;
use thiserror::Error;

use crate::signature::SignatureError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("The webhook signature header is missing.")]
    MissingSignature,
    #[error("Webhook rejected. {0}")]
    InvalidSignature(SignatureError),
    #[error("The payment event could not be used. {0}")]
    InvalidEvent(String),
    #[error("Method not allowed.")]
    MethodNotAllowed,
    #[error("Requests from this address are not accepted.")]
    ForbiddenPeer,
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl From<SignatureError> for ServerError {
    fn from(e: SignatureError) -> Self {
        match e {
            SignatureError::SecretNotConfigured => Self::ConfigurationError(e.to_string()),
            e => Self::InvalidSignature(e),
        }
    }
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::InvalidEvent(s) => Self::InvalidEvent(s),
            e @ ReconciliationError::Infrastructure { .. } => Self::BackendError(e.to_string()),
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSignature => StatusCode::BAD_REQUEST,
            Self::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            Self::InvalidEvent(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::ForbiddenPeer => StatusCode::FORBIDDEN,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("💻️ Responding with {status}. {self}");
        }
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "received": false, "error": self.to_string() }).to_string())
    }
}
