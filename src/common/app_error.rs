//! Error taxonomy shared by every handler.
//!
//! Callers only ever see the [`ErrorKind`] and a short message. Underlying
//! causes (driver errors, sqlx errors) are written to the application log.

use crate::connector::ConnectorError;
use crate::vojo::base_response::BaseResponse;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    ConnectionFailed,
    ValidationFailed,
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ConnectionFailed => StatusCode::BAD_GATEWAY,
            ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{message}")]
    ConnectionFailed { message: String, cause: String },
    #[error("{0}")]
    ValidationFailed(String),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            AppError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn connection_failed(message: impl Into<String>, cause: impl ToString) -> Self {
        AppError::ConnectionFailed {
            message: message.into(),
            cause: cause.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AppError::Conflict("record already exists".to_string());
            }
        }
        AppError::Internal(err.into())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<ConnectorError> for AppError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Connection(cause) => {
                AppError::connection_failed("could not connect to data source", cause)
            }
            ConnectorError::UnknownTable(table) => {
                AppError::NotFound(format!("table {} does not exist", table))
            }
            ConnectorError::InvalidFilter(reason) => {
                AppError::ValidationFailed(format!("invalid filter condition: {}", reason))
            }
            ConnectorError::Query(cause) => AppError::Internal(anyhow!("{}", cause)),
        }
    }
}

/// Logs the cause of `err` and turns it into the JSON envelope.
pub fn error_response(err: AppError) -> Response {
    match &err {
        AppError::Internal(cause) => error!("internal error: {:?}", cause),
        AppError::ConnectionFailed { message, cause } => warn!("{}: {}", message, cause),
        other => info!("request rejected: {}", other),
    }
    let kind = err.kind();
    let body: BaseResponse<()> = BaseResponse::failure(err.to_string(), kind);
    (kind.status_code(), axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_errors_map_to_kinds() {
        let cases = [
            (ConnectorError::Connection("refused".into()), ErrorKind::ConnectionFailed),
            (ConnectorError::UnknownTable("t".into()), ErrorKind::NotFound),
            (ConnectorError::InvalidFilter("bad".into()), ErrorKind::ValidationFailed),
            (ConnectorError::Query("syntax".into()), ErrorKind::Internal),
        ];
        for (err, kind) in cases {
            assert_eq!(AppError::from(err).kind(), kind);
        }
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let err = AppError::from(anyhow!("password=hunter2 rejected"));
        assert_eq!(err.to_string(), "internal error");
        assert_eq!(err.kind().status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_connection_failed_message_excludes_cause() {
        let err = AppError::connection_failed("source connection failed", "tcp refused");
        assert_eq!(err.to_string(), "source connection failed");
        assert_eq!(err.kind().status_code(), StatusCode::BAD_GATEWAY);
    }
}
