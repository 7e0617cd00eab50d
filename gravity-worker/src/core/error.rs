use crate::core::job::{JobStatus, Operation};
use std::error::Error as StdError;
use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors returned by every operation in this crate and by transport implementations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GravityError {
    /// The service could not be reached, or the health check was rejected.
    #[error("Can't connect to Gravity: {message}")]
    Connectivity {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    /// Bad endpoint, schedule expression or timezone.
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// The service rejected the request and explained why.
    #[error("Gravity returned {status_code}: {message}")]
    Service { status_code: u16, message: String },
    /// Nothing to dequeue. This is the steady state of an idle topic, not a failure.
    #[error("No job available ({status_code})")]
    NotFound { status_code: u16 },
    #[error("Can't {operation} job {job_id}: service answered {status_code}")]
    Operation {
        operation: Operation,
        job_id: String,
        status_code: u16,
    },
    #[error("Can't {operation} job {job_id}: job is {status}, expected in_progress")]
    Precondition {
        operation: Operation,
        job_id: String,
        status: JobStatus,
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Encountered an error when tried to serialize a request.
    #[error("Failed to encode request")]
    Encode {
        #[source]
        source: BoxError,
    },
    /// Encountered an error when tried to deserialize a service response.
    #[error("Failed to decode service response")]
    Decode {
        #[source]
        source: BoxError,
    },
}

impl GravityError {
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
            source: None,
        }
    }

    pub fn connectivity_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Connectivity {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn encode<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Encode {
            source: Box::new(source),
        }
    }

    pub fn decode<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Decode {
            source: Box::new(source),
        }
    }

    /// True for the distinguished "queue is empty" outcome of a dequeue.
    pub fn is_empty_queue(&self) -> bool {
        matches!(self, Self::NotFound { status_code: 404 })
    }

    /// HTTP-ish status code carried by the error, if the service produced one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Service { status_code, .. }
            | Self::NotFound { status_code }
            | Self::Operation { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}
