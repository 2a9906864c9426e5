use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::search::SearchError;

/// Errors surfaced to API callers. Refresh failures never appear here; a
/// failed cycle just means callers keep reading the previous generation.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unknown language")]
    UnknownLanguage,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("not found")]
    NotFound,

    #[error("search error: {0}")]
    Search(#[from] SearchError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::UnknownLanguage | ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
