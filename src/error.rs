use crate::resp::{RespError, RespValue};

/// Errors surfaced to clients as `-` replies, plus the server's own failures.
#[derive(Debug, thiserror::Error)]
pub enum RespiteError {
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArgCount(String),

    #[error("ERR unknown command '{0}', with args beginning with: {1}")]
    UnknownCommand(String, String),

    #[error("ERR invalid command format")]
    InvalidRequest,

    #[error("ERR invalid command name")]
    InvalidCommandName,

    #[error("ERR arguments must be bulk strings")]
    InvalidArgument,

    #[error("ERR AOF append failed: {0}")]
    Persistence(std::io::Error),

    #[error("ERR Protocol error: {0}")]
    Protocol(#[from] RespError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RespiteError {
    /// Render this error as a wire-level error reply.
    pub fn to_resp(&self) -> RespValue {
        RespValue::error(self.to_string())
    }
}

pub type RespiteResult<T> = Result<T, RespiteError>;
