use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed backend envelope: {0}")]
    Envelope(String),

    #[error("Backend API error: {0}")]
    Api(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Team generation error: {0}")]
    Team(String),

    #[error("Match error: {0}")]
    Match(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl ArenaError {
    /// Failures of the model call itself, as opposed to an unusable answer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ArenaError::Transport(_)
                | ArenaError::Status { .. }
                | ArenaError::Envelope(_)
                | ArenaError::Api(_)
        )
    }
}

impl From<reqwest::Error> for ArenaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ArenaError::Envelope(err.to_string())
        } else {
            ArenaError::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ArenaError>;
