use thiserror::Error;

#[derive(Error, Debug)]
pub enum WringError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Event with title \"{0}\" not found")]
    EventNotFound(String),

    #[error("Pipe #{0} not found")]
    PipeNotFound(u64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}
