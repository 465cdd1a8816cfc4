use thiserror::Error;
use warp::http::StatusCode;

use crate::files::FileStoreError;
use crate::store::StoreError;

/// Every failure a gateway operation or route can report to its caller.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Sheet '{0}' not found")]
    TableNotFound(String),

    #[error("Sheet '{0}' is empty")]
    EmptyTable(String),

    #[error("{0}")]
    NotFound(String),

    #[error("write failed: {0}")]
    WriteFailure(#[source] StoreError),

    #[error("read failed: {0}")]
    ReadFailure(#[source] StoreError),

    #[error("upload failed: {0}")]
    UploadFailure(#[source] FileStoreError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Classify a store fault raised while mutating a table.
    pub fn write(err: StoreError) -> Self {
        match err {
            StoreError::TableNotFound(t) => Self::TableNotFound(t),
            other => Self::WriteFailure(other),
        }
    }

    /// Classify a store fault raised on a read-only path.
    pub fn read(err: StoreError) -> Self {
        match err {
            StoreError::TableNotFound(t) => Self::TableNotFound(t),
            other => Self::ReadFailure(other),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::EmptyTable(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::TableNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::WriteFailure(_) | Self::ReadFailure(_) | Self::UploadFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<FileStoreError> for GatewayError {
    fn from(err: FileStoreError) -> Self {
        Self::UploadFailure(err)
    }
}

impl warp::reject::Reject for GatewayError {}
