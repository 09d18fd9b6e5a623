use thiserror::Error;

/// Result type for daemon operations
pub type Result<T> = std::result::Result<T, OnkyoError>;

/// Errors that can occur while mediating between clients and receivers
#[derive(Error, Debug)]
pub enum OnkyoError {
    /// Client sent an unknown command name or an argument the translator
    /// rejected
    #[error("invalid command")]
    InvalidCommand,

    /// Bytes from the receiver contained no recognizable frame
    #[error("receiver error")]
    ReceiverError,

    /// A bind address could not be parsed into host and port
    #[error("invalid bind address: {0}")]
    BindAddress(String),

    /// Serial port error
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
