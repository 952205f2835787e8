//! Error types shared by the proxy, the generation client and the session.

/// Failures of a single call to the generation provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    /// The provider answered but produced neither an image nor text.
    #[error("The API returned an empty response.")]
    EmptyResponse,

    /// Network or provider failure, message passed through as-is.
    #[error("{0}")]
    Transport(String),
}

impl From<reqwest::Error> for GenerateError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Conditions that keep the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("API_KEY environment variable is not set.")]
    MissingApiKey,

    #[error("invalid bind address {value:?}: {source}")]
    InvalidBindAddress {
        value: String,
        source: std::net::AddrParseError,
    },

    #[error("invalid body limit {0:?}: expected a positive byte count")]
    InvalidBodyLimit(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: warp::Error,
    },
}

/// Failures surfaced by the client-side session. The display text is what
/// the user sees in the error state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Missing upload or empty prompt; no request was sent.
    #[error("{0}")]
    Validation(String),

    /// The selected file could not be read.
    #[error("{0}")]
    FileRead(String),

    /// The proxy call failed or its answer could not be decoded.
    #[error("Error: {0}")]
    Transport(String),

    /// The proxy answered without an image.
    #[error("{0}")]
    NoImage(String),
}
