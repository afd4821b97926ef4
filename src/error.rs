use reqwest::StatusCode;
use std::result::Result as StdResult;
use thiserror::Error;

use crate::validate::BorrowCheck;

#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON marshalling failed {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP IO failed {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request failed {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("No book matches {0}")]
    NotFound(String),

    #[error("Response to {0} carried no data")]
    Envelope(String),

    #[error("{0}")]
    Validation(BorrowCheck),
}

pub type Result<A> = StdResult<A, Error>;
