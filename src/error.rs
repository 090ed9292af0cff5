use thiserror::Error;

/// Failures the client can observe while talking to its three endpoints or
/// while turning the streamed answer into markup.
///
/// None of these reach the caller as a crash: the orchestrator downgrades
/// them to an empty result list, an empty suggestion list or an apology
/// string, and logs them.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or connection level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Well-formed response that carries an `error` field
    #[error("Backend reported error: {0}")]
    Backend(String),

    /// Non-success HTTP status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Markdown to markup conversion failed
    #[error("Rendering failed: {0}")]
    Rendering(String),

    /// Invalid base URL or other configuration problem
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Short label used as a structured logging field
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Transport(_) => "transport",
            ClientError::Backend(_) => "backend",
            ClientError::Status(_) => "status",
            ClientError::Decode(_) => "decode",
            ClientError::Rendering(_) => "rendering",
            ClientError::Config(_) => "config",
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Status(status.as_u16())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
