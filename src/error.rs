use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("config error: {0}")]
    Config(String),

    #[error("no input data: {0}")]
    NoInputData(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid window length {0}: must be > 0")]
    InvalidWindow(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
