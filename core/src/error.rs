use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Symbol receiver disconnected")]
    Disconnected,

    #[error("Timed out waiting for transmission to drain ({pending} symbols pending)")]
    DrainTimeout { pending: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModemError>;
