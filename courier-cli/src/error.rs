use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Request error: {0}")]
    Request(#[from] courier_engine::RequestError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("{failed} of {total} requests failed")]
    RequestsFailed { failed: usize, total: usize },
}
