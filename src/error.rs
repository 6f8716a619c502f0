use std::io;
use thiserror::Error;

/// Errors raised while parsing commands, scripts and save records.
///
/// None of these are fatal to the host: the command layer logs them and
/// reports completion anyway.
#[derive(Error, Debug)]
pub enum PfxError {
    /// A command was called with fewer arguments than it needs
    #[error("{func}: missing argument {index}")]
    MissingArgument { func: String, index: usize },

    /// An argument could not be converted to the expected type
    #[error("{func}: argument {index} has invalid value '{value}'")]
    InvalidArgument {
        func: String,
        index: usize,
        value: String,
    },

    /// No handler is registered under this name
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Script error: {0}")]
    Script(#[from] toml::de::Error),

    /// Save record written by a newer version
    #[error("Unsupported save version: {0}")]
    UnsupportedVersion(u32),

    #[error("Image error: {0}")]
    Image(String),
}

/// Result type using PfxError
pub type Result<T> = std::result::Result<T, PfxError>;
