use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("age must be a whole number between {min} and {max}")]
    OutOfRange { min: i64, max: i64 },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("model API key not configured; provide an API key")]
    MissingCredentials,
    #[error("no response from the generation model")]
    EmptyResponse,
    #[error("malformed simulation response: {0}")]
    MalformedResponse(String),
    #[error("generation request failed: {0}")]
    UpstreamFailure(String),
    #[error("generation request timed out after {0}s")]
    Timeout(u64),
}

impl GenerationError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        GenerationError::MalformedResponse(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        GenerationError::UpstreamFailure(msg.into())
    }

    /// Errors the caller can fix by correcting the submission or the configuration.
    pub fn is_client_error(&self) -> bool {
        matches!(self, GenerationError::Validation(_))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("memory store unreachable: {0}")]
    Connection(String),
    #[error("memory store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("memory store tool error: {0}")]
    Tool(String),
    #[error("memory store timed out after {0}s")]
    Timeout(u64),
}
