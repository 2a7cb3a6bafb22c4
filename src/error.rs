use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The network call itself failed before any HTTP status was produced.
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response. `message` prefers the body's `detail` field when the
    /// backend sent one.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        data: Option<Value>,
    },

    /// A 401 that the refresh protocol could not resolve. Terminal for the
    /// current session; the credential store has already been cleared.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// Successful response whose body did not match the expected shape.
    #[error("unexpected response from {endpoint}: {detail}")]
    Decode { endpoint: String, detail: String },

    /// Request body could not be serialized.
    #[error("invalid request body for {endpoint}: {detail}")]
    Body { endpoint: String, detail: String },

    #[error("client configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP status associated with the error, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::SessionExpired(_) => Some(401),
            _ => None,
        }
    }

    /// Parsed error body, when the server sent a JSON one.
    ///
    /// Validation errors arrive as field-keyed arrays here, e.g.
    /// `{"username": ["A user with that username already exists."]}`.
    pub fn data(&self) -> Option<&Value> {
        match self {
            ApiError::Http { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    /// True when the session is unrecoverable and the caller should route the
    /// user back to authentication.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }
}
