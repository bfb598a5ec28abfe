use thiserror::Error;

/// A convenience `Result` alias using [`SwitchyardError`].
pub type SwitchyardResult<T> = Result<T, SwitchyardError>;

/// Top-level error type for Switchyard.
///
/// Most variants correspond to a subsystem that can produce errors. The
/// routing variants (`MalformedReference`, `CircuitOpen`, `NoProvider`,
/// `AllCandidatesExhausted`) are produced by the model router while it walks
/// its candidate list.
#[derive(Error, Debug)]
pub enum SwitchyardError {
    /// An error originating from the agent execution loop.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error from an outbound HTTP request (e.g. an LLM API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// A credential could not be obtained or refreshed.
    #[error("Auth error: {0}")]
    Auth(String),

    /// An error reading or writing the secret store.
    #[error("Secret store error: {0}")]
    Secret(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error raised by a tool during invocation.
    #[error("Tool error: {0}")]
    Tool(String),

    /// An error from a communication channel.
    #[error("Channel error: {0}")]
    Channel(String),

    /// A model reference string is not of the form `provider/account/model`.
    #[error("Invalid model ref \"{0}\". Expected format: \"provider/account/model\"")]
    MalformedReference(String),

    /// The circuit breaker for an account is open.
    #[error("Circuit open for {0}")]
    CircuitOpen(String),

    /// No backend handle is registered for an account key.
    #[error("No provider registered for {0}")]
    NoProvider(String),

    /// Every candidate of a routing attempt failed.
    #[error("All LLM providers exhausted. Last error: {last_error}")]
    AllCandidatesExhausted {
        /// Message of the last underlying failure.
        last_error: String,
    },

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
