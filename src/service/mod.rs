pub mod datasource_service;
pub mod health_service;
pub mod migration_task_service;
pub mod router;
pub mod table_service;

use crate::common::app_error::AppError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::Json;

/// Wraps a handler result in the JSON envelope. Errors go through
/// [`crate::common::app_error::error_response`].
#[macro_export]
macro_rules! handle_response {
    ($result:expr, $message:expr) => {
        match $result {
            Ok(data) => Ok((
                axum::http::StatusCode::OK,
                axum::Json($crate::vojo::base_response::BaseResponse::success(
                    $message, data,
                )),
            )
                .into_response()),
            Err(e) => Ok($crate::common::app_error::error_response(e)),
        }
    };
}

/// Turns a body that failed to deserialize into a validation error.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::ValidationFailed(rejection.body_text()))
}

pub(crate) fn path_param<T>(path: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    path.map(|Path(value)| value)
        .map_err(|rejection| AppError::ValidationFailed(rejection.body_text()))
}

pub(crate) fn query_param<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::ValidationFailed(rejection.body_text()))
}
