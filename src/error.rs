use std::fmt::Display;

use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{debug, error};
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{manage::ManageError, AdmissionError, TallyError};
use crate::store::{Constraint, StoreError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    #[error(transparent)]
    Tally(#[from] TallyError),
    #[error(transparent)]
    Manage(#[from] ManageError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl Display) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Status(Status::Unauthorized, message.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Store(StoreError::Conflict(_)) => Status::Conflict,
            Self::Store(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Admission(err) => match err {
                AdmissionError::CandidateMismatch { .. } => Status::UnprocessableEntity,
                AdmissionError::ElectionNotOpen(_) | AdmissionError::VoterIneligible => {
                    Status::Forbidden
                }
                AdmissionError::DuplicateVote => Status::Conflict,
                AdmissionError::Store(_) => Status::InternalServerError,
            },
            Self::Tally(err) => match err {
                TallyError::ResultsNotAvailable(_) => Status::Forbidden,
                TallyError::Uncounted { .. } | TallyError::Store(_) => {
                    Status::InternalServerError
                }
            },
            Self::Manage(err) => match err {
                ManageError::Invalid(_) => Status::BadRequest,
                ManageError::NotFound(_) => Status::NotFound,
                ManageError::Conflict(_) => Status::Conflict,
                ManageError::Hash(_) | ManageError::Store(_) => Status::InternalServerError,
            },
            Self::Status(status, _) => *status,
        }
    }

    /// Name of the error kind, so clients can tell rejections apart.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store(StoreError::Conflict(Constraint::OneVotePerElection)) => "DuplicateVote",
            Self::Store(StoreError::Conflict(_)) => "Conflict",
            Self::Admission(err) => err.kind(),
            Self::Tally(err) => err.kind(),
            Self::Manage(err) => err.kind(),
            _ => kind_of_status(self.status()),
        }
    }
}

fn kind_of_status(status: Status) -> &'static str {
    match status.code {
        400 => "BadRequest",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "NotFound",
        409 => "Conflict",
        422 => "UnprocessableEntity",
        _ if status.class() == StatusClass::ServerError => "InternalError",
        _ => "Other",
    }
}

/// The JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl ErrorBody {
    /// A body for an error Rocket raised itself, e.g. when no route matched.
    pub fn for_status(status: Status) -> Self {
        Self {
            kind: kind_of_status(status).to_string(),
            message: status.reason_lossy().to_string(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let message = if status.class() == StatusClass::ServerError {
            // Details stay in the log.
            error!("{self:?}");
            status.reason_lossy().to_string()
        } else {
            debug!("Rejected request: {self}");
            self.to_string()
        };
        let body = ErrorBody {
            kind: self.kind().to_string(),
            message,
        };
        (status, Json(body)).respond_to(req)
    }
}
