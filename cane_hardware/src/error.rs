use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serial read timeout")]
    Timeout,
    #[error("device disconnected")]
    Disconnected,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
