use http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Resource not found: {kind} {name} in namespace {namespace}")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error("Resource already exists: {kind} {name} in namespace {namespace}")]
    AlreadyExists {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("JSON patch error: {0}")]
    PatchError(#[from] json_patch::PatchError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Failed to access object metadata: {0}")]
    MetadataError(String),

    #[error("No reaction handled {verb} on {resource}")]
    NoReaction { verb: String, resource: String },

    #[error("Validation failed for {kind}: {}", errors.join("; "))]
    ValidationFailed { kind: String, errors: Vec<String> },

    #[error("API error ({code} {reason}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    #[error("Kube client error: {0}")]
    Kube(kube::Error),
}

impl Error {
    /// HTTP status code the API server would answer with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::AlreadyExists { .. } | Error::Conflict(_) => StatusCode::CONFLICT,
            Error::InvalidRequest(_) | Error::ValidationFailed { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::SerializationError(_) | Error::PatchError(_) | Error::MetadataError(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NoReaction { .. } => StatusCode::NOT_IMPLEMENTED,
            Error::Api { code, .. } => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Error::Internal(_) | Error::Kube(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Kubernetes `Status.reason` for this error
    pub fn reason(&self) -> &str {
        match self {
            Error::NotFound { .. } => "NotFound",
            Error::AlreadyExists { .. } => "AlreadyExists",
            Error::Conflict(_) => "Conflict",
            Error::InvalidRequest(_) | Error::ValidationFailed { .. } => "Invalid",
            Error::SerializationError(_) | Error::PatchError(_) | Error::MetadataError(_) => {
                "BadRequest"
            }
            Error::NoReaction { .. } => "NotImplemented",
            Error::Api { reason, .. } => reason,
            Error::Internal(_) | Error::Kube(_) => "InternalError",
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.reason() == "NotFound"
    }

    pub fn is_already_exists(&self) -> bool {
        self.reason() == "AlreadyExists"
    }

    pub fn is_conflict(&self) -> bool {
        self.reason() == "Conflict"
    }

    pub fn is_invalid(&self) -> bool {
        self.reason() == "Invalid"
    }

    /// Build the `Status` body the API server returns for a failed request
    pub fn to_status(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": self.to_string(),
            "reason": self.reason(),
            "code": self.status_code().as_u16(),
        })
    }
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => Error::Api {
                code: resp.code,
                reason: resp.reason,
                message: resp.message,
            },
            other => Error::Kube(other),
        }
    }
}
