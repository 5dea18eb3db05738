use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("{backend} backend: {message}")]
    Backend { backend: String, message: String },

    #[error("sheet not found: {0}")]
    SheetNotFound(String),

    #[error("row {row} is outside the sheet (rows are 1-based)")]
    InvalidRow { row: u32 },

    #[error("sink is closed")]
    Closed,
}

impl SinkError {
    pub fn from_backend<E: std::fmt::Display>(backend: &str, err: E) -> Self {
        SinkError::Backend {
            backend: backend.to_string(),
            message: err.to_string(),
        }
    }
}
