use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote returned {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("response decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("event not found")]
    EventNotFound,
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("feed connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("feed connection closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("console task is gone")]
    Closed,
    #[error("no event is selected")]
    NoActiveEvent,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for environment variable {0}")]
    InvalidVar(&'static str),
}
