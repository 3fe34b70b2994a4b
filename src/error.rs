use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("no worker registered for type: {worker_type}")]
    WorkerNotRegistered { worker_type: String },

    #[error("Decomposition failed: {0}")]
    Decomposition(String),

    #[error("Worker execution failed: {0}")]
    Execution(String),
}

pub type Result<T> = std::result::Result<T, Error>;
