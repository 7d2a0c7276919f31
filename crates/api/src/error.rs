use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A filter value was malformed or did not resolve to a known dimension row
    #[error("invalid value for `{filter}`: {message}")]
    Validation {
        filter: &'static str,
        message: String,
    },
    /// A dimension name matched more than one row
    #[error("filter `{filter}` value `{value}` matched {matches} rows")]
    AmbiguousFilter {
        filter: &'static str,
        value: String,
        matches: usize,
    },
    #[error("invalid pagination: {0}")]
    InvalidPagination(String),
    #[error("invalid quality grade table: {0}")]
    InvalidGrade(String),
    #[error("storage failure: {0}")]
    Storage(#[from] db::Error),
}

impl Error {
    pub fn validation(filter: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            filter,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } | Error::InvalidPagination(_) => StatusCode::BAD_REQUEST,
            Error::AmbiguousFilter { .. } | Error::InvalidGrade(_) | Error::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Error::Validation { .. } | Error::InvalidPagination(_) => self.to_string(),
            Error::AmbiguousFilter { .. } | Error::InvalidGrade(_) => {
                error!("data integrity violation: {}", self);
                String::from("data integrity violation")
            }
            Error::Storage(e) => {
                error!("error querying climate data: {}", e);
                String::from("failed to query climate data")
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
