use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("report receiver has been dropped")]
    Closed,
    #[error("failed writing report message: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize report message: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no tick scheduler configured and no tokio runtime is running")]
    MissingScheduler,
    #[error("tokio runtime is multi-threaded; pass an explicit tick scheduler")]
    MultiThreadRuntime,
}
