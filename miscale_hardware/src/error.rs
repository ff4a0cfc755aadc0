use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("bluetooth error: {0}")]
    Ble(String),
    #[error("no bluetooth adapter available")]
    NoAdapter,
    #[error("no scale found during discovery scan")]
    NotFound,
    #[error("scale does not expose the measurement characteristic")]
    MissingCharacteristic,
    #[error("transport used before connect")]
    NotConnected,
    #[error("scale disconnected")]
    Disconnected,
    #[error("scale did not answer the connect request in time")]
    Timeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
