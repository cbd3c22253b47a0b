use thiserror::Error;

/// Exit codes following Unix conventions.
pub const EXIT_GENERAL: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_NETWORK: i32 = 3;
pub const EXIT_AUTH: i32 = 4;
pub const EXIT_FILE: i32 = 5;

#[derive(Error, Debug)]
pub enum CliError {
    /// Bad input caught before any network I/O (oversized payload,
    /// empty stdin, bad flag combination, unknown config key).
    #[error("{0}")]
    Validation(String),

    /// A local file could not be read or written.
    #[error("{0}")]
    File(String),

    /// Connection, DNS or timeout failure after retries were exhausted.
    #[error("Network error: {0}")]
    Transport(String),

    /// Terminal non-2xx response from the server.
    #[error("{message}")]
    Remote { status: u16, message: String },

    /// The response body matched neither the expected record shape nor
    /// the error envelope. Signals a client/server protocol mismatch.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A client key is required but not configured.
    #[error("{0}")]
    Auth(String),

    /// Config file could not be loaded or written.
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Builds a terminal error from an HTTP status and the server's
    /// detail message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        CliError::Remote {
            status,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation(_) => EXIT_USAGE,
            CliError::File(_) => EXIT_FILE,
            CliError::Transport(_) => EXIT_NETWORK,
            CliError::Remote { status, .. } => match *status {
                s if s >= 500 => EXIT_NETWORK,
                401 | 403 => EXIT_AUTH,
                s if s >= 400 => EXIT_USAGE,
                _ => EXIT_GENERAL,
            },
            CliError::Protocol(_) => EXIT_GENERAL,
            CliError::Auth(_) => EXIT_AUTH,
            CliError::Config(_) => EXIT_GENERAL,
            CliError::Io(_) => EXIT_GENERAL,
        }
    }
}

/// Whether a status code is worth another attempt. Everything else,
/// success included, is terminal for retry purposes.
pub fn retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}
